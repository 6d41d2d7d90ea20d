use std::collections::BTreeMap;

use crate::names::CaseInsensitiveMap;

use super::{ColumnId, ConstraintId, SortDirection, clean_comments};

/// What kind of relation a [`Table`] models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKind {
    Table,
    /// A view: no indexes, auto-increment detection or row count.
    View,
    /// A table from another schema, pulled in to resolve a cross-schema
    /// foreign key.
    Remote {
        /// The schema under analysis that caused this table to be loaded.
        base_schema: Option<String>,
        /// Named by a metadata override rather than discovered from a key.
        explicit: bool,
    },
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    /// Backs the table's primary key.
    pub primary_key: bool,
    pub id: Option<i64>,
    pub(crate) columns: Vec<(ColumnId, SortDirection)>,
}

impl Index {
    /// Indexed columns in key order with their sort direction.
    #[must_use]
    pub fn columns(&self) -> &[(ColumnId, SortDirection)] {
        &self.columns
    }

    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.columns.iter().map(|(column, _)| *column)
    }
}

/// A table, view or remote table.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
    pub kind: TableKind,
    pub comments: Option<String>,
    /// `None` when unknown (views, disabled counting or a failed count).
    pub row_count: Option<u64>,
    pub id: Option<i64>,
    /// Check constraint text by constraint name.
    pub check_constraints: BTreeMap<String, String>,
    pub(crate) columns: Vec<ColumnId>,
    pub(crate) column_index: CaseInsensitiveMap<ColumnId>,
    pub(crate) primary_keys: Vec<ColumnId>,
    pub(crate) foreign_keys: CaseInsensitiveMap<ConstraintId>,
    pub(crate) indexes: CaseInsensitiveMap<Index>,
    pub(crate) max_parents: usize,
    pub(crate) max_children: usize,
}

impl Table {
    pub(crate) fn new(schema: Option<String>, name: String, kind: TableKind) -> Self {
        Self {
            schema,
            name,
            kind,
            comments: None,
            row_count: None,
            id: None,
            check_constraints: BTreeMap::new(),
            columns: Vec::new(),
            column_index: CaseInsensitiveMap::new(),
            primary_keys: Vec::new(),
            foreign_keys: CaseInsensitiveMap::new(),
            indexes: CaseInsensitiveMap::new(),
            max_parents: 0,
            max_children: 0,
        }
    }

    /// `schema.name`, or just the name when the schema is unknown.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        crate::error::qualified(self.schema.as_deref(), &self.name)
    }

    /// Columns in declared order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    /// Case-insensitive column lookup.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<ColumnId> {
        self.column_index.get(name).copied()
    }

    /// Primary key columns in key order.
    #[must_use]
    pub fn primary_columns(&self) -> &[ColumnId] {
        &self.primary_keys
    }

    /// Declared foreign key constraints, ordered by upper-cased name.
    pub fn foreign_keys(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.foreign_keys.values().copied()
    }

    #[must_use]
    pub fn foreign_key(&self, name: &str) -> Option<ConstraintId> {
        self.foreign_keys.get(name).copied()
    }

    /// Indexes ordered by upper-cased name.
    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn index_mut(&mut self, name: &str) -> Option<&mut Index> {
        self.indexes.get_mut(name)
    }

    /// The index backing the primary key, if one is flagged.
    #[must_use]
    pub fn primary_index(&self) -> Option<&Index> {
        self.indexes.values().find(|index| index.primary_key)
    }

    /// Number of parent links ever made to this table's columns.
    ///
    /// Monotonic: unlinking does not decrease it.
    #[must_use]
    pub const fn max_parents(&self) -> usize {
        self.max_parents
    }

    /// Number of child links ever made from this table's columns.
    #[must_use]
    pub const fn max_children(&self) -> usize {
        self.max_children
    }

    #[must_use]
    pub const fn is_view(&self) -> bool {
        matches!(self.kind, TableKind::View)
    }

    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self.kind, TableKind::Remote { .. })
    }

    pub fn set_comments(&mut self, comments: Option<&str>) {
        self.comments = clean_comments(comments);
    }
}
