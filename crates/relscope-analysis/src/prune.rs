//! Edge-removal primitives for breaking cycles.
//!
//! Ordering logic (for example, producing a table order in which parents
//! come before children) calls these one at a time until the graph is
//! acyclic. Tables and columns are never removed, only links.

use relscope_core::{ConstraintId, Schema, TableId};
use tracing::debug;

/// Remove a constraint by which `table` references itself.
///
/// Every column pair of that constraint is unlinked. Returns the constraint,
/// or `None` when the table has no self-reference.
pub fn remove_self_referencing_constraint(
    schema: &mut Schema,
    table: TableId,
) -> Option<ConstraintId> {
    let constraint = schema
        .table(table)
        .columns()
        .iter()
        .flat_map(|column| schema.parents(*column))
        .find(|(parent, _)| schema.column(*parent).table() == table)
        .map(|(_, constraint)| constraint)?;

    let pairs: Vec<_> = schema.constraint(constraint).pairs().collect();
    for (parent, child) in pairs {
        schema.unlink(parent, child);
    }
    debug!(
        table = %schema.table(table).name,
        constraint = %schema.constraint(constraint).name(),
        "self reference removed"
    );
    Some(constraint)
}

/// Remove one link from `table`, from whichever side has fewer links.
///
/// When the table has no more parent links than child links a parent link
/// is removed, otherwise a child link. Returns the constraint that carried
/// the removed link, or `None` when that side has no links.
pub fn remove_a_foreign_key_constraint(
    schema: &mut Schema,
    table: TableId,
) -> Option<ConstraintId> {
    let remove_parent = schema.num_parents(table) <= schema.num_children(table);
    let columns = schema.table(table).columns().to_vec();

    for column in columns {
        if remove_parent {
            if let Some((parent, constraint)) = schema.parents(column).first().copied() {
                schema.unlink(parent, column);
                return Some(constraint);
            }
        } else if let Some((child, constraint)) = schema.children(column).first().copied() {
            schema.unlink(column, child);
            return Some(constraint);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use relscope_core::model::TableDraft;

    fn employees() -> (Schema, TableId) {
        let mut schema = Schema::new("db", None);
        let employees = schema.add_table(
            TableDraft::new(None, "employees")
                .column("id", "int", 10)
                .column("manager_id", "int", 10)
                .column("mentor_id", "int", 10)
                .primary_key("id"),
        );
        (schema, employees)
    }

    #[test]
    fn removes_every_pair_of_a_self_reference() {
        let (mut schema, employees) = employees();
        let id = schema.column_named(employees, "id").unwrap();
        let manager = schema.column_named(employees, "manager_id").unwrap();
        let mentor = schema.column_named(employees, "mentor_id").unwrap();
        let fk = schema.add_foreign_key(employees, "fk_people");
        schema.link(fk, id, manager);
        schema.link(fk, id, mentor);

        assert_eq!(remove_self_referencing_constraint(&mut schema, employees), Some(fk));
        assert_eq!(schema.num_parents(employees), 0);
        assert_eq!(remove_self_referencing_constraint(&mut schema, employees), None);
        assert_eq!(schema.table(employees).max_parents(), 2);
    }

    #[test]
    fn self_reference_ignores_other_tables() {
        let (mut schema, employees) = employees();
        let departments = schema.add_table(
            TableDraft::new(None, "departments")
                .column("id", "int", 10)
                .column("head_id", "int", 10),
        );
        let id = schema.column_named(employees, "id").unwrap();
        let head = schema.column_named(departments, "head_id").unwrap();
        let fk = schema.add_foreign_key(departments, "fk_head");
        schema.link(fk, id, head);

        assert_eq!(remove_self_referencing_constraint(&mut schema, departments), None);
        assert_eq!(schema.num_parents(departments), 1);
    }

    #[test]
    fn removes_from_the_lighter_side() {
        let mut schema = Schema::new("db", None);
        let hub = schema.add_table(
            TableDraft::new(None, "hub")
                .column("id", "int", 10)
                .column("owner_id", "int", 10),
        );
        let owners = schema.add_table(TableDraft::new(None, "owners").column("id", "int", 10));
        let a = schema.add_table(TableDraft::new(None, "a").column("hub_id", "int", 10));
        let b = schema.add_table(TableDraft::new(None, "b").column("hub_id", "int", 10));

        let hub_id = schema.column_named(hub, "id").unwrap();
        let owner_ref = schema.column_named(hub, "owner_id").unwrap();
        let owner_id = schema.column_named(owners, "id").unwrap();
        let owner_fk = schema.add_foreign_key(hub, "fk_owner");
        schema.link(owner_fk, owner_id, owner_ref);
        for child_table in [a, b] {
            let child = schema.column_named(child_table, "hub_id").unwrap();
            let fk = schema.add_foreign_key(child_table, "fk_hub");
            schema.link(fk, hub_id, child);
        }

        // One parent, two children: the parent link goes first.
        assert_eq!(remove_a_foreign_key_constraint(&mut schema, hub), Some(owner_fk));
        assert_eq!(schema.num_parents(hub), 0);
        assert_eq!(schema.num_children(hub), 2);

        // Now a root: the lighter side is empty, so nothing is removed.
        assert_eq!(remove_a_foreign_key_constraint(&mut schema, hub), None);
        assert_eq!(schema.num_children(hub), 2);

        // A leaf has more parents than children: the child side is tried.
        assert_eq!(remove_a_foreign_key_constraint(&mut schema, a), None);
        assert_eq!(schema.num_parents(a), 1);
    }

    #[test]
    fn removes_a_child_link_when_parents_outnumber_children() {
        let mut schema = Schema::new("db", None);
        let lines = schema.add_table(
            TableDraft::new(None, "lines")
                .column("id", "int", 10)
                .column("order_id", "int", 10)
                .column("product_id", "int", 10),
        );
        let orders = schema.add_table(TableDraft::new(None, "orders").column("id", "int", 10));
        let products = schema.add_table(TableDraft::new(None, "products").column("id", "int", 10));
        let notes = schema.add_table(TableDraft::new(None, "notes").column("line_id", "int", 10));

        for (parent_table, column, name) in [
            (orders, "order_id", "fk_order"),
            (products, "product_id", "fk_product"),
        ] {
            let parent = schema.column_named(parent_table, "id").unwrap();
            let child = schema.column_named(lines, column).unwrap();
            let fk = schema.add_foreign_key(lines, name);
            schema.link(fk, parent, child);
        }
        let line_id = schema.column_named(lines, "id").unwrap();
        let note_line = schema.column_named(notes, "line_id").unwrap();
        let note_fk = schema.add_foreign_key(notes, "fk_note_line");
        schema.link(note_fk, line_id, note_line);

        assert_eq!(remove_a_foreign_key_constraint(&mut schema, lines), Some(note_fk));
        assert!(schema.children(line_id).is_empty());
        assert!(schema.parents(note_line).is_empty());
        assert_eq!(schema.child_constraint(line_id, note_line), None);
        assert!(schema.is_leaf(lines));
        assert_eq!(schema.num_parents(lines), 2);
        assert_eq!(schema.table(lines).max_children(), 1);
    }
}
