//! Unlinked table descriptions produced by table construction.
//!
//! Drafts are plain owned data so they can be built on worker threads and
//! handed to the [`Schema`](super::Schema) afterwards, which assigns ids.

use crate::source::{ColumnRow, SortDirection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDraft {
    pub name: String,
    pub type_name: String,
    pub length: u32,
    pub decimal_digits: u32,
    pub nullable: bool,
    pub auto_updated: bool,
    pub default_value: Option<String>,
    pub comments: Option<String>,
    pub ordinal: u32,
}

impl From<ColumnRow> for ColumnDraft {
    fn from(row: ColumnRow) -> Self {
        Self {
            name: row.name,
            type_name: row.type_name,
            length: row.length,
            decimal_digits: row.decimal_digits,
            nullable: row.nullable,
            auto_updated: false,
            default_value: row.default_value,
            comments: row.remarks,
            ordinal: row.ordinal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDraft {
    pub name: String,
    pub unique: bool,
    pub primary_key: bool,
    pub columns: Vec<(String, SortDirection)>,
}

impl IndexDraft {
    #[must_use]
    pub const fn new(name: String, unique: bool) -> Self {
        Self {
            name,
            unique,
            primary_key: false,
            columns: Vec::new(),
        }
    }
}

/// A constructed but not yet registered table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableDraft {
    pub schema: Option<String>,
    pub name: String,
    pub view: bool,
    pub comments: Option<String>,
    pub columns: Vec<ColumnDraft>,
    pub indexes: Vec<IndexDraft>,
    /// Primary key column names in key order.
    pub primary_keys: Vec<String>,
    pub row_count: Option<u64>,
}

impl TableDraft {
    #[must_use]
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Append a column with the next ordinal.
    #[must_use]
    pub fn column(mut self, name: &str, type_name: &str, length: u32) -> Self {
        let ordinal = u32::try_from(self.columns.len() + 1).unwrap_or(u32::MAX);
        self.columns.push(ColumnDraft {
            name: name.to_string(),
            type_name: type_name.to_string(),
            length,
            decimal_digits: 0,
            nullable: true,
            auto_updated: false,
            default_value: None,
            comments: None,
            ordinal,
        });
        self
    }

    #[must_use]
    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_keys.push(column.to_string());
        self
    }

    /// Record an index, merging with an earlier index of the same name.
    pub fn add_index_column(
        &mut self,
        index_name: &str,
        unique: bool,
        column: &str,
        direction: SortDirection,
    ) {
        let position = self
            .indexes
            .iter()
            .position(|index| index.name.eq_ignore_ascii_case(index_name));
        let position = position.unwrap_or_else(|| {
            self.indexes
                .push(IndexDraft::new(index_name.to_string(), unique));
            self.indexes.len() - 1
        });
        self.indexes[position]
            .columns
            .push((column.to_string(), direction));
    }

    /// Flag the index with the given name as backing the primary key.
    pub fn mark_primary_index(&mut self, index_name: &str) {
        for index in &mut self.indexes {
            if index.name.eq_ignore_ascii_case(index_name) {
                index.primary_key = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_rows_merge_by_name() {
        let mut draft = TableDraft::new(None, "orders");
        draft.add_index_column("IX_A", false, "a", SortDirection::Ascending);
        draft.add_index_column("ix_a", false, "b", SortDirection::Descending);
        draft.add_index_column("IX_B", true, "c", SortDirection::Ascending);
        assert_eq!(draft.indexes.len(), 2);
        assert_eq!(draft.indexes[0].columns.len(), 2);
        assert!(draft.indexes[1].unique);

        draft.mark_primary_index("ix_b");
        assert!(draft.indexes[1].primary_key);
        assert!(!draft.indexes[0].primary_key);
    }

    #[test]
    fn columns_get_sequential_ordinals() {
        let draft = TableDraft::new(Some("app"), "t")
            .column("a", "int", 4)
            .column("b", "int", 4);
        assert_eq!(draft.columns[0].ordinal, 1);
        assert_eq!(draft.columns[1].ordinal, 2);
        assert_eq!(draft.schema.as_deref(), Some("app"));
    }
}
