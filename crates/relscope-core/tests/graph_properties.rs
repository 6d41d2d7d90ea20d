use proptest::prelude::*;
use relscope_core::model::TableDraft;
use relscope_core::{ColumnId, Schema};

#[derive(Debug, Clone)]
enum Op {
    Link { parent: usize, child: usize },
    Unlink { parent: usize, child: usize },
    UnlinkParents { table: usize },
}

fn arb_op(columns: usize, tables: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..columns, 0..columns).prop_map(|(parent, child)| Op::Link { parent, child }),
        2 => (0..columns, 0..columns).prop_map(|(parent, child)| Op::Unlink { parent, child }),
        1 => (0..tables).prop_map(|table| Op::UnlinkParents { table }),
    ]
}

/// Three tables of three columns each, plus a random operation sequence.
fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(9, 3), 1..60)
}

fn build() -> (Schema, Vec<ColumnId>) {
    let mut schema = Schema::new("db", None);
    let mut columns = Vec::new();
    for name in ["alpha", "beta", "gamma"] {
        let table = schema.add_table(
            TableDraft::new(None, name)
                .column("id", "int", 10)
                .column("ref_a", "int", 10)
                .column("ref_b", "int", 10),
        );
        columns.extend_from_slice(schema.table(table).columns());
    }
    (schema, columns)
}

fn assert_symmetric(schema: &Schema, columns: &[ColumnId]) -> Result<(), TestCaseError> {
    for column in columns {
        for (parent, constraint) in schema.parents(*column) {
            prop_assert!(schema.children(parent).contains(&(*column, constraint)));
        }
        for (child, constraint) in schema.children(*column) {
            prop_assert!(schema.parents(child).contains(&(*column, constraint)));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn links_stay_symmetric(ops in arb_ops()) {
        let (mut schema, columns) = build();
        let tables = schema.tables();
        for op in ops {
            match op {
                Op::Link { parent, child } => {
                    let child_table = schema.column(columns[child]).table();
                    let fk = schema.add_foreign_key(child_table, &format!("fk_{parent}_{child}"));
                    schema.link(fk, columns[parent], columns[child]);
                }
                Op::Unlink { parent, child } => {
                    schema.unlink(columns[parent], columns[child]);
                }
                Op::UnlinkParents { table } => {
                    schema.unlink_parents(tables[table]);
                }
            }
            assert_symmetric(&schema, &columns)?;
        }
    }

    #[test]
    fn link_counters_never_decrease(ops in arb_ops()) {
        let (mut schema, columns) = build();
        let tables = schema.tables();
        let mut previous: Vec<(usize, usize)> = vec![(0, 0); tables.len()];
        for op in ops {
            match op {
                Op::Link { parent, child } => {
                    let child_table = schema.column(columns[child]).table();
                    let fk = schema.add_foreign_key(child_table, "fk");
                    schema.link(fk, columns[parent], columns[child]);
                }
                Op::Unlink { parent, child } => {
                    schema.unlink(columns[parent], columns[child]);
                }
                Op::UnlinkParents { table } => {
                    schema.unlink_parents(tables[table]);
                }
            }
            for (n, table) in tables.iter().enumerate() {
                let now = (
                    schema.table(*table).max_parents(),
                    schema.table(*table).max_children(),
                );
                prop_assert!(now.0 >= previous[n].0);
                prop_assert!(now.1 >= previous[n].1);
                prop_assert!(now.0 >= schema.num_parents(*table));
                previous[n] = now;
            }
        }
    }

    #[test]
    fn constraint_arity_matches(ops in arb_ops()) {
        let (mut schema, columns) = build();
        for op in ops {
            if let Op::Link { parent, child } = op {
                let child_table = schema.column(columns[child]).table();
                let fk = schema.add_foreign_key(child_table, "fk_shared");
                schema.link(fk, columns[parent], columns[child]);
            }
        }
        for constraint in schema.constraints() {
            let constraint = schema.constraint(constraint);
            prop_assert_eq!(constraint.child_columns().len(), constraint.parent_columns().len());
        }
    }
}
