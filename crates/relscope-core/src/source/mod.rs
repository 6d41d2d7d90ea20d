//! Interface to the external metadata catalog.
//!
//! # Overview
//!
//! A [`MetadataSource`] answers the catalog queries the loader and linker
//! need: the table enumeration, per-table columns / indexes / primary keys /
//! foreign keys, and a handful of optional vendor-specific supplementary
//! queries. Every query returns fully materialized rows; cursor handling and
//! call-level timeouts belong to the implementation and surface here as
//! [`SourceError`]s.
//!
//! The loader calls per-table queries from several worker threads at once,
//! so implementations must be [`Sync`]. A source backed by a single
//! sequential cursor serializes access internally.
//!
//! Optional queries have default implementations that return no rows, which
//! the loader treats the same as "nothing to add".

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

pub use memory::{Fetch, MemorySource, MemoryTable};

/// Kind of relation reported by the table enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    #[default]
    Table,
    View,
}

/// One row of the table enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub kind: RelationKind,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl TableDescriptor {
    #[must_use]
    pub fn table_ref(&self) -> TableRef<'_> {
        TableRef {
            schema: self.schema.as_deref(),
            name: &self.name,
        }
    }
}

/// Borrowed `(schema, name)` pair identifying a table in per-table queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRef<'a> {
    pub schema: Option<&'a str>,
    pub name: &'a str,
}

impl<'a> TableRef<'a> {
    #[must_use]
    pub const fn new(schema: Option<&'a str>, name: &'a str) -> Self {
        Self { schema, name }
    }
}

/// One row of a table's column listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRow {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub decimal_digits: u32,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    /// 1-based ordinal position within the table.
    #[serde(default)]
    pub ordinal: u32,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl ColumnRow {
    /// A nullable column with no default, placed by the order rows are added.
    #[must_use]
    pub fn new(name: &str, type_name: &str, length: u32) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            length,
            decimal_digits: 0,
            nullable: true,
            default_value: None,
            ordinal: 0,
            remarks: None,
        }
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn digits(mut self, decimal_digits: u32) -> Self {
        self.decimal_digits = decimal_digits;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: &str) -> Self {
        self.default_value = Some(value.to_string());
        self
    }

    #[must_use]
    pub fn remarks(mut self, remarks: &str) -> Self {
        self.remarks = Some(remarks.to_string());
        self
    }
}

/// Sort order of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One `(index, column)` row of a table's index listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub index_name: Option<String>,
    #[serde(default)]
    pub unique: bool,
    pub column: Option<String>,
    #[serde(default)]
    pub direction: SortDirection,
    /// Table statistics rows some catalogs mix into the index listing.
    #[serde(default)]
    pub statistic: bool,
}

/// One `(constraint, column)` row of a table's primary key listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyRow {
    pub constraint_name: Option<String>,
    pub column: String,
}

/// One column pair of a foreign key, as listed by imported/exported key
/// queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRow {
    pub constraint_name: Option<String>,
    #[serde(default)]
    pub child_schema: Option<String>,
    pub child_table: String,
    pub child_column: String,
    #[serde(default)]
    pub parent_schema: Option<String>,
    pub parent_table: String,
    pub parent_column: String,
}

/// A named check constraint of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraintRow {
    pub table: String,
    pub name: String,
    pub text: String,
}

/// A vendor-specific numeric surrogate id of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableIdRow {
    pub table: String,
    pub id: i64,
}

/// A vendor-specific numeric surrogate id of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexIdRow {
    pub table: String,
    pub index: String,
    pub id: i64,
}

/// Comment text for a table (`column == None`) or one of its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRow {
    pub table: String,
    #[serde(default)]
    pub column: Option<String>,
    pub comments: Option<String>,
}

/// The external catalog the loader and linker read from.
pub trait MetadataSource: Sync {
    /// Enumerate the tables and views of the schema under analysis.
    ///
    /// # Errors
    ///
    /// A failure here is a caller-visible hard failure of the whole load.
    fn tables(&self) -> Result<Vec<TableDescriptor>, SourceError>;

    /// List the columns of `table`.
    ///
    /// # Errors
    ///
    /// A failure is fatal for `table`, which is then omitted.
    fn columns(&self, table: TableRef<'_>) -> Result<Vec<ColumnRow>, SourceError>;

    /// List the indexes of `table`, one row per indexed column.
    ///
    /// # Errors
    ///
    /// A failure is logged and the table is kept without indexes.
    fn indexes(&self, table: TableRef<'_>) -> Result<Vec<IndexRow>, SourceError>;

    /// List the primary key columns of `table` in key order.
    ///
    /// # Errors
    ///
    /// A failure is fatal for `table`, which is then omitted.
    fn primary_keys(&self, table: TableRef<'_>) -> Result<Vec<PrimaryKeyRow>, SourceError>;

    /// List the foreign keys declared by `table` (where it is the child).
    ///
    /// # Errors
    ///
    /// A failure leaves `table` without declared parents.
    fn imported_keys(&self, table: TableRef<'_>) -> Result<Vec<ForeignKeyRow>, SourceError>;

    /// List the foreign keys that reference `table` (where it is the parent).
    ///
    /// Only consulted for cross-schema discovery.
    ///
    /// # Errors
    ///
    /// A failure only loses cross-schema discovery for `table`.
    fn exported_keys(&self, _table: TableRef<'_>) -> Result<Vec<ForeignKeyRow>, SourceError> {
        Ok(Vec::new())
    }

    /// Number of rows in `table`, if the source can tell.
    ///
    /// # Errors
    ///
    /// Non-fatal; the row count stays unknown.
    fn row_count(&self, _table: TableRef<'_>) -> Result<Option<u64>, SourceError> {
        Ok(None)
    }

    /// Names of the auto-generated columns of `table`.
    ///
    /// # Errors
    ///
    /// Non-fatal; every column keeps `auto_updated == false`.
    fn auto_increment_columns(&self, _table: TableRef<'_>) -> Result<Vec<String>, SourceError> {
        Ok(Vec::new())
    }

    /// Check constraints across the schema.
    ///
    /// # Errors
    ///
    /// Non-fatal.
    fn check_constraints(&self) -> Result<Vec<CheckConstraintRow>, SourceError> {
        Ok(Vec::new())
    }

    /// Numeric table ids across the schema.
    ///
    /// # Errors
    ///
    /// Non-fatal.
    fn table_ids(&self) -> Result<Vec<TableIdRow>, SourceError> {
        Ok(Vec::new())
    }

    /// Numeric index ids across the schema.
    ///
    /// # Errors
    ///
    /// Non-fatal.
    fn index_ids(&self) -> Result<Vec<IndexIdRow>, SourceError> {
        Ok(Vec::new())
    }

    /// Table comments that replace the enumeration's remarks.
    ///
    /// # Errors
    ///
    /// Non-fatal.
    fn table_comments(&self) -> Result<Vec<CommentRow>, SourceError> {
        Ok(Vec::new())
    }

    /// Column comments that replace the column listing's remarks.
    ///
    /// # Errors
    ///
    /// Non-fatal.
    fn column_comments(&self) -> Result<Vec<CommentRow>, SourceError> {
        Ok(Vec::new())
    }
}

const fn default_true() -> bool {
    true
}
