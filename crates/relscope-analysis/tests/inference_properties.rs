use std::collections::BTreeSet;

use proptest::prelude::*;
use relscope_analysis::{SubgraphBuilder, infer_implied_constraints};
use relscope_core::model::TableDraft;
use relscope_core::{ColumnId, Schema, TableId};

const NAMES: [&str; 5] = ["id", "order_id", "code", "owner_id", "ref"];

/// A table: primary key name index, then extra column name indexes.
type TableShape = (usize, Vec<usize>);

fn arb_shape() -> impl Strategy<Value = TableShape> {
    (0..NAMES.len(), prop::collection::vec(0..NAMES.len(), 0..4))
}

/// Tables plus declared links as (parent column index, child column index)
/// into the flattened column list.
fn arb_schema() -> impl Strategy<Value = (Vec<TableShape>, Vec<(usize, usize)>)> {
    (
        prop::collection::vec(arb_shape(), 2..6),
        prop::collection::vec((0..64_usize, 0..64_usize), 0..6),
    )
}

fn build(
    shapes: &[TableShape],
    links: &[(usize, usize)],
) -> (Schema, Vec<TableId>, Vec<ColumnId>) {
    let mut schema = Schema::new("db", None);
    let mut tables = Vec::new();
    for (n, (key, extras)) in shapes.iter().enumerate() {
        let mut draft = TableDraft::new(None, &format!("t{n}")).column(NAMES[*key], "int", 10);
        for extra in extras {
            draft = draft.column(NAMES[*extra], "int", 10);
        }
        // Duplicate column names collapse into one column.
        tables.push(schema.add_table(draft.primary_key(NAMES[*key])));
    }

    let columns: Vec<_> = tables
        .iter()
        .flat_map(|table| schema.table(*table).columns().to_vec())
        .collect();
    for (n, (parent, child)) in links.iter().enumerate() {
        let (parent, child) = (columns[parent % columns.len()], columns[child % columns.len()]);
        let fk = schema.add_foreign_key(schema.column(child).table(), &format!("fk_{n}"));
        schema.link(fk, parent, child);
    }
    (schema, tables, columns)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(128))]

    #[test]
    fn inference_is_idempotent((shapes, links) in arb_schema()) {
        let (mut schema, _, _) = build(&shapes, &links);
        infer_implied_constraints(&mut schema);
        prop_assert!(infer_implied_constraints(&mut schema).is_empty());
    }

    #[test]
    fn inference_never_self_references_or_doubles_a_link((shapes, links) in arb_schema()) {
        let (mut schema, _, columns) = build(&shapes, &links);
        let declared: BTreeSet<_> = columns
            .iter()
            .flat_map(|child| {
                let parents = schema.parents(*child).into_iter();
                parents.map(move |(parent, _)| (parent, *child))
            })
            .collect();

        for constraint in infer_implied_constraints(&mut schema) {
            let constraint = schema.constraint(constraint);
            prop_assert!(constraint.is_implied());
            for (parent, child) in constraint.pairs() {
                prop_assert_ne!(schema.column(parent).table(), schema.column(child).table());
                prop_assert!(!declared.contains(&(parent, child)));
                prop_assert!(!declared.contains(&(child, parent)));
            }
        }
    }

    #[test]
    fn one_degree_holds_only_direct_relatives(
        (shapes, links) in arb_schema(),
        implied in any::<bool>(),
    ) {
        let (mut schema, tables, _) = build(&shapes, &links);
        infer_implied_constraints(&mut schema);
        let builder = SubgraphBuilder::new(&schema).include_implied(implied);

        for focus in &tables {
            let mut linked = BTreeSet::new();
            for column in schema.table(*focus).columns() {
                let mut related = schema.parents(*column);
                related.extend(schema.children(*column));
                for (other, constraint) in related {
                    if implied || !schema.constraint(constraint).is_implied() {
                        linked.insert(schema.table(schema.column(other).table()).name.clone());
                    }
                }
            }
            let focal_name = &schema.table(*focus).name;
            let subgraph = builder.focused(*focus);
            let mut seen = BTreeSet::new();
            for node in &subgraph.nodes {
                prop_assert!(seen.insert(node.table.clone()), "duplicate node {}", node.table);
                prop_assert!(&node.table == focal_name || linked.contains(&node.table));
            }
        }
    }

    #[test]
    fn two_degrees_is_relatives_of_relatives((shapes, links) in arb_schema()) {
        let (schema, tables, _) = build(&shapes, &links);
        let one = SubgraphBuilder::new(&schema);
        let two = SubgraphBuilder::new(&schema).two_degrees(true);

        for focus in &tables {
            let near = one.focused(*focus);
            let mut expected: BTreeSet<String> = BTreeSet::new();
            for node in &near.nodes {
                let table = schema.table_named(&node.table).unwrap_or(*focus);
                expected.extend(one.focused(table).nodes.into_iter().map(|n| n.table));
            }
            let far = two.focused(*focus);
            let actual: BTreeSet<String> = far.nodes.iter().map(|n| n.table.clone()).collect();
            prop_assert_eq!(actual.len(), far.nodes.len());
            prop_assert_eq!(actual, expected);
        }
    }
}
