//! Entity graph model: tables, columns, indexes and foreign key constraints.
//!
//! # Overview
//!
//! A [`Schema`] owns every entity in flat arenas and hands out copyable ids
//! ([`TableId`], [`ColumnId`], [`ConstraintId`]). Relationships between
//! columns live in a single petgraph [`StableDiGraph`] whose nodes are
//! columns and whose edges carry the constraint that links them:
//!
//! ```text
//! parent column ──(ConstraintId)──▶ child column
//! ```
//!
//! A column's parent map is its incoming edges and its child map is its
//! outgoing edges, so both endpoints always observe the same constraint and
//! removing an edge unlinks both directions at once. Cycles, including a
//! column referencing a key of its own table, are ordinary edges.
//!
//! Entities are never deleted. Only edges are removed, by the explicit
//! unlink operations.
//!
//! [`StableDiGraph`]: petgraph::stable_graph::StableDiGraph

mod column;
mod constraint;
mod draft;
mod schema;
mod table;

pub use column::{Column, ColumnFlags};
pub use constraint::ForeignKeyConstraint;
pub use draft::{ColumnDraft, IndexDraft, TableDraft};
pub use schema::Schema;
pub use table::{Index, Table, TableKind};

pub use crate::source::SortDirection;

/// Identifies a table, view or remote table within its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) usize);

/// Identifies a column within its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub(crate) usize);

/// Identifies a foreign key constraint (declared or implied) within its
/// [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub(crate) usize);

impl TableId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl ColumnId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl ConstraintId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Trim comment text; blank comments become `None`.
#[must_use]
pub fn clean_comments(comments: Option<&str>) -> Option<String> {
    comments
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
