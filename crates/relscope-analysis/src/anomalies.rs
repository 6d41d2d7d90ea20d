//! Structural anomaly detectors.
//!
//! Each detector is a pure function over a set of tables and returns a
//! sorted list: tables by name, columns by (table name, column name).

use std::collections::HashMap;

use relscope_core::{ColumnId, Index, Schema, TableId};
use serde::Serialize;

use crate::sort_tables;

/// A table without relationships.
///
/// With `include_implied`, a table qualifies only if it was never linked at
/// all. Without it, a table whose links are all implied still qualifies.
#[must_use]
pub fn is_orphan(schema: &Schema, table: TableId, include_implied: bool) -> bool {
    if include_implied {
        let table = schema.table(table);
        table.max_parents() == 0 && table.max_children() == 0
    } else {
        schema.num_real_parents(table) == 0 && schema.num_real_children(table) == 0
    }
}

#[must_use]
pub fn orphans(schema: &Schema, tables: &[TableId], include_implied: bool) -> Vec<TableId> {
    let mut found: Vec<_> = tables
        .iter()
        .copied()
        .filter(|table| is_orphan(schema, *table, include_implied))
        .collect();
    sort_tables(schema, &mut found);
    found
}

/// Tables (not views) without any index.
#[must_use]
pub fn tables_without_indexes(schema: &Schema, tables: &[TableId]) -> Vec<TableId> {
    let mut found: Vec<_> = tables
        .iter()
        .copied()
        .filter(|table| {
            let table = schema.table(*table);
            !table.is_view() && table.indexes().next().is_none()
        })
        .collect();
    sort_tables(schema, &mut found);
    found
}

/// Columns of unique indexes whose columns are all nullable.
#[must_use]
pub fn must_be_unique_nullable_columns(schema: &Schema, tables: &[TableId]) -> Vec<ColumnId> {
    let mut found: Vec<ColumnId> = tables
        .iter()
        .flat_map(|table| schema.table(*table).indexes())
        .filter(|index| {
            index.unique
                && !index.columns().is_empty()
                && index
                    .column_ids()
                    .all(|column| schema.column(column).nullable)
        })
        .flat_map(Index::column_ids)
        .collect();
    found.sort_by(|a, b| schema.compare_columns(*a, *b));
    found.dedup();
    found
}

/// Tables that look denormalized: two columns sharing a prefix with numeric
/// suffixes one apart, like `phone1` and `phone2`.
///
/// Columns are scanned in declared order. A name without a numeric suffix
/// counts as suffix `1`, so `phone` followed by `phone2` also qualifies.
#[must_use]
pub fn incrementing_column_names(schema: &Schema, tables: &[TableId]) -> Vec<TableId> {
    let mut found: Vec<_> = tables
        .iter()
        .copied()
        .filter(|table| has_incrementing_columns(schema, *table))
        .collect();
    sort_tables(schema, &mut found);
    found
}

fn has_incrementing_columns(schema: &Schema, table: TableId) -> bool {
    let mut prefixes: HashMap<&str, u64> = HashMap::new();
    for column in schema.table(table).columns() {
        let name = schema.column(*column).name.as_str();
        let (prefix, suffix) = split_numeric_suffix(name);
        let Some(number) = suffix.map_or(Some(1), |digits| digits.parse::<u64>().ok()) else {
            continue;
        };
        if prefixes
            .get(prefix)
            .is_some_and(|previous| previous.abs_diff(number) == 1)
        {
            return true;
        }
        prefixes.insert(prefix, number);
    }
    false
}

/// Split off the maximal run of trailing ASCII digits. The first character
/// always stays in the prefix.
fn split_numeric_suffix(name: &str) -> (&str, Option<&str>) {
    let digits = name
        .bytes()
        .skip(1)
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        (name, None)
    } else {
        let split = name.len() - digits;
        (&name[..split], Some(&name[split..]))
    }
}

#[must_use]
pub fn single_column_tables(schema: &Schema, tables: &[TableId]) -> Vec<TableId> {
    let mut found: Vec<_> = tables
        .iter()
        .copied()
        .filter(|table| schema.table(*table).columns().len() == 1)
        .collect();
    sort_tables(schema, &mut found);
    found
}

/// Primary key columns nothing references.
#[must_use]
pub fn unreferenced_primary_keys(schema: &Schema, tables: &[TableId]) -> Vec<ColumnId> {
    let mut found: Vec<_> = tables
        .iter()
        .flat_map(|table| schema.table(*table).primary_columns().iter().copied())
        .filter(|column| schema.child_count(*column) == 0)
        .collect();
    found.sort_by(|a, b| schema.compare_columns(*a, *b));
    found
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A column named by its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    #[must_use]
    pub fn new(schema: &Schema, column: ColumnId) -> Self {
        let column = schema.column(column);
        Self {
            table: schema.table(column.table()).name.clone(),
            column: column.name.clone(),
        }
    }
}

/// Every detector's findings by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyReport {
    /// Orphans counting implied relationships.
    pub orphans: Vec<String>,
    /// Orphans ignoring implied relationships.
    pub orphans_without_implied: Vec<String>,
    pub tables_without_indexes: Vec<String>,
    pub unique_nullable_columns: Vec<ColumnRef>,
    pub incrementing_column_names: Vec<String>,
    pub single_column_tables: Vec<String>,
    pub unreferenced_primary_keys: Vec<ColumnRef>,
}

impl AnomalyReport {
    /// Run every detector over `tables`.
    #[must_use]
    pub fn collect(schema: &Schema, tables: &[TableId]) -> Self {
        let names = |found: Vec<TableId>| -> Vec<String> {
            found
                .into_iter()
                .map(|table| schema.table(table).name.clone())
                .collect()
        };
        let columns = |found: Vec<ColumnId>| -> Vec<ColumnRef> {
            found
                .into_iter()
                .map(|column| ColumnRef::new(schema, column))
                .collect()
        };

        Self {
            orphans: names(orphans(schema, tables, true)),
            orphans_without_implied: names(orphans(schema, tables, false)),
            tables_without_indexes: names(tables_without_indexes(schema, tables)),
            unique_nullable_columns: columns(must_be_unique_nullable_columns(schema, tables)),
            incrementing_column_names: names(incrementing_column_names(schema, tables)),
            single_column_tables: names(single_column_tables(schema, tables)),
            unreferenced_primary_keys: columns(unreferenced_primary_keys(schema, tables)),
        }
    }

    /// Total number of findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orphans.len()
            + self.tables_without_indexes.len()
            + self.unique_nullable_columns.len()
            + self.incrementing_column_names.len()
            + self.single_column_tables.len()
            + self.unreferenced_primary_keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
