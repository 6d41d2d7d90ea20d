use super::{ColumnId, TableId};

/// A foreign key relationship, declared in the catalog or implied.
///
/// `child_columns[i]` references `parent_columns[i]`; both lists always have
/// the same length. Declared constraints are also registered in the child
/// table's foreign key map. Implied constraints exist only as column edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    pub(crate) name: String,
    pub(crate) table: TableId,
    pub(crate) parent_table: Option<TableId>,
    pub(crate) child_columns: Vec<ColumnId>,
    pub(crate) parent_columns: Vec<ColumnId>,
    pub(crate) implied: bool,
}

impl ForeignKeyConstraint {
    pub(crate) const fn new(name: String, table: TableId, implied: bool) -> Self {
        Self {
            name,
            table,
            parent_table: None,
            child_columns: Vec::new(),
            parent_columns: Vec::new(),
            implied,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The child (referencing) table.
    #[must_use]
    pub const fn table(&self) -> TableId {
        self.table
    }

    /// The parent (referenced) table, once at least one column pair is linked.
    #[must_use]
    pub const fn parent_table(&self) -> Option<TableId> {
        self.parent_table
    }

    #[must_use]
    pub fn child_columns(&self) -> &[ColumnId] {
        &self.child_columns
    }

    #[must_use]
    pub fn parent_columns(&self) -> &[ColumnId] {
        &self.parent_columns
    }

    #[must_use]
    pub const fn is_implied(&self) -> bool {
        self.implied
    }

    /// Column pairs as `(parent, child)`.
    pub fn pairs(&self) -> impl Iterator<Item = (ColumnId, ColumnId)> + '_ {
        self.parent_columns
            .iter()
            .copied()
            .zip(self.child_columns.iter().copied())
    }
}
