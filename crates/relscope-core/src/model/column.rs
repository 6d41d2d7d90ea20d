use petgraph::graph::NodeIndex;

use super::{TableId, clean_comments};

/// Per-column switches set by metadata overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnFlags {
    /// Never infer an implied parent for this column.
    pub implied_parents_disabled: bool,
    /// Never infer an implied child referencing this column.
    pub implied_children_disabled: bool,
    /// Leave this column's relationships out of relationship diagrams.
    pub excluded: bool,
}

/// A column of a table.
///
/// A column belongs to exactly one table for its lifetime; the owning table
/// is a non-owning back-reference ([`Column::table`]).
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) table: TableId,
    pub(crate) node: NodeIndex,
    pub name: String,
    pub type_name: String,
    pub length: u32,
    pub decimal_digits: u32,
    pub nullable: bool,
    /// Auto-generated (identity / auto-increment) column.
    pub auto_updated: bool,
    pub default_value: Option<String>,
    pub comments: Option<String>,
    /// 1-based declared position within the table.
    pub ordinal: u32,
    pub flags: ColumnFlags,
}

impl Column {
    /// The table this column belongs to.
    #[must_use]
    pub const fn table(&self) -> TableId {
        self.table
    }

    /// Length with decimal digits appended when present, e.g. `10` or `12,2`.
    #[must_use]
    pub fn detailed_size(&self) -> String {
        if self.decimal_digits > 0 {
            format!("{},{}", self.length, self.decimal_digits)
        } else {
            self.length.to_string()
        }
    }

    pub fn set_comments(&mut self, comments: Option<&str>) {
        self.comments = clean_comments(comments);
    }
}
