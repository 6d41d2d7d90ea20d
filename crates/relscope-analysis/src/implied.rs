//! Implied foreign key inference.
//!
//! A column is assumed to reference another table when it has no parent yet
//! and its `(name, type, length)` identity equals that of the other table's
//! single-column primary key. Composite keys never match.
//!
//! When more primary keys collide on identity than there are distinct
//! identities, key names do not distinguish tables (think every table keyed
//! by `ID`) and nothing is inferred.

use std::collections::BTreeMap;

use relscope_core::{ColumnId, ConstraintId, Schema, TableId};
use tracing::{debug, instrument};

use crate::base_tables;

/// Column identity used for matching: compared by name, then type, then
/// length.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Identity {
    name: String,
    type_name: String,
    length: u32,
}

impl Identity {
    fn of(schema: &Schema, column: ColumnId) -> Self {
        let column = schema.column(column);
        Self {
            name: column.name.clone(),
            type_name: column.type_name.clone(),
            length: column.length,
        }
    }
}

/// Infer implied constraints over the local tables and link them into the
/// graph.
///
/// Returns the new constraints in the order they were created: candidates
/// are visited by (table name, column name). Running it again on the
/// resulting graph creates nothing.
#[instrument(skip_all)]
pub fn infer_implied_constraints(schema: &mut Schema) -> Vec<ConstraintId> {
    let tables = base_tables(schema);
    let mut primaries: BTreeMap<Identity, TableId> = BTreeMap::new();
    let mut duplicates = 0_usize;
    let mut candidates = Vec::new();

    for table in &tables {
        if let [key] = schema.table(*table).primary_columns() {
            let identity = Identity::of(schema, *key);
            if primaries.insert(identity, *table).is_some() {
                duplicates += 1;
            }
        }
        for column in schema.table(*table).columns() {
            if schema.parent_count(*column) == 0
                && !schema.column(*column).flags.implied_parents_disabled
            {
                candidates.push(*column);
            }
        }
    }

    if duplicates > primaries.len() {
        debug!(
            duplicates,
            distinct = primaries.len(),
            "primary key names are not distinctive, skipping inference"
        );
        return Vec::new();
    }

    candidates.sort_by(|a, b| schema.compare_columns(*a, *b));

    let mut implied = Vec::new();
    for child in candidates {
        let Some(&parent_table) = primaries.get(&Identity::of(schema, child)) else {
            continue;
        };
        if parent_table == schema.column(child).table() {
            continue;
        }
        let Some(parent) = schema.column_named(parent_table, &schema.column(child).name) else {
            continue;
        };
        if schema.column(parent).flags.implied_children_disabled {
            continue;
        }
        if schema.parent_constraint(child, parent).is_some()
            || schema.parent_constraint(parent, child).is_some()
        {
            continue;
        }
        let constraint = schema.add_implied_constraint(parent, child);
        debug!(
            parent = %schema.column_label(parent),
            child = %schema.column_label(child),
            "implied relationship"
        );
        implied.push(constraint);
    }
    implied
}
