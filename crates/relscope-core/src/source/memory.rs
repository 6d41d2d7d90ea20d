//! In-memory catalog snapshot implementing [`MetadataSource`].
//!
//! A [`MemorySource`] holds every catalog row up front. It deserializes from
//! a JSON catalog dump (see [`MemorySource::from_json`]) and can be assembled
//! fluently, which is how the test suites describe their schemas:
//!
//! ```rust,ignore
//! let source = MemorySource::new(Some("app"))
//!     .with_table(
//!         MemoryTable::new("orders")
//!             .column(ColumnRow::new("id", "int4", 10).not_null())
//!             .primary_key("orders_pk", &["id"]),
//!     )
//!     .with_table(
//!         MemoryTable::new("line_items")
//!             .column(ColumnRow::new("order_id", "int4", 10))
//!             .foreign_key("line_items_order_fk", "order_id", "orders", "id"),
//!     );
//! ```
//!
//! Tables whose schema differs from the source's schema are not enumerated by
//! [`MetadataSource::tables`] but still answer per-table queries, which
//! models tables living in other schemas.
//!
//! Individual queries can be made to fail with [`MemorySource::failing`] to
//! exercise the loader's error classification.

use serde::{Deserialize, Serialize};

use super::{
    CheckConstraintRow, ColumnRow, CommentRow, ForeignKeyRow, IndexIdRow, IndexRow,
    MetadataSource, PrimaryKeyRow, RelationKind, SortDirection, TableDescriptor, TableIdRow,
    TableRef,
};
use crate::error::SourceError;

/// Catalog queries that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fetch {
    Tables,
    Columns,
    Indexes,
    PrimaryKeys,
    ImportedKeys,
    ExportedKeys,
    RowCount,
    AutoIncrement,
    CheckConstraints,
    TableIds,
    IndexIds,
    TableComments,
    ColumnComments,
}

impl Fetch {
    /// Query name used in [`SourceError`]s.
    #[must_use]
    pub const fn what(self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Columns => "columns",
            Self::Indexes => "indexes",
            Self::PrimaryKeys => "primary keys",
            Self::ImportedKeys => "imported keys",
            Self::ExportedKeys => "exported keys",
            Self::RowCount => "row count",
            Self::AutoIncrement => "auto increment",
            Self::CheckConstraints => "check constraints",
            Self::TableIds => "table ids",
            Self::IndexIds => "index ids",
            Self::TableComments => "table comments",
            Self::ColumnComments => "column comments",
        }
    }
}

/// A configured failure: `fetch` fails for `table`, or for every table when
/// `table` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRule {
    pub fetch: Fetch,
    #[serde(default)]
    pub table: Option<String>,
}

/// Every catalog row of one table or view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryTable {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub kind: RelationKind,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnRow>,
    #[serde(default)]
    pub indexes: Vec<IndexRow>,
    #[serde(default)]
    pub primary_keys: Vec<PrimaryKeyRow>,
    /// Imported keys: foreign keys where this table is the child.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyRow>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub auto_increment: Vec<String>,
}

impl MemoryTable {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn view(name: &str) -> Self {
        Self {
            kind: RelationKind::View,
            ..Self::new(name)
        }
    }

    /// Place the table in `schema` instead of the source's schema.
    #[must_use]
    pub fn in_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    #[must_use]
    pub fn remarks(mut self, remarks: &str) -> Self {
        self.remarks = Some(remarks.to_string());
        self
    }

    /// Append a column; an unset ordinal becomes the next position.
    #[must_use]
    pub fn column(mut self, mut column: ColumnRow) -> Self {
        if column.ordinal == 0 {
            column.ordinal = u32::try_from(self.columns.len() + 1).unwrap_or(u32::MAX);
        }
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn index(mut self, name: &str, unique: bool, columns: &[&str]) -> Self {
        self.indexes.extend(columns.iter().map(|column| IndexRow {
            index_name: Some(name.to_string()),
            unique,
            column: Some((*column).to_string()),
            direction: SortDirection::Ascending,
            statistic: false,
        }));
        self
    }

    /// Declare the primary key; `name` also marks a same-named index as the
    /// primary key index.
    #[must_use]
    pub fn primary_key(mut self, name: &str, columns: &[&str]) -> Self {
        self.primary_keys
            .extend(columns.iter().map(|column| PrimaryKeyRow {
                constraint_name: Some(name.to_string()),
                column: (*column).to_string(),
            }));
        self
    }

    /// Declare one column pair of a foreign key to a table in the same schema.
    #[must_use]
    pub fn foreign_key(
        mut self,
        name: &str,
        child_column: &str,
        parent_table: &str,
        parent_column: &str,
    ) -> Self {
        self.foreign_keys.push(ForeignKeyRow {
            constraint_name: Some(name.to_string()),
            child_schema: None,
            child_table: self.name.clone(),
            child_column: child_column.to_string(),
            parent_schema: None,
            parent_table: parent_table.to_string(),
            parent_column: parent_column.to_string(),
        });
        self
    }

    /// Declare one column pair of a foreign key to a table in another schema.
    #[must_use]
    pub fn remote_foreign_key(
        mut self,
        name: &str,
        child_column: &str,
        parent_schema: &str,
        parent_table: &str,
        parent_column: &str,
    ) -> Self {
        self.foreign_keys.push(ForeignKeyRow {
            constraint_name: Some(name.to_string()),
            child_schema: None,
            child_table: self.name.clone(),
            child_column: child_column.to_string(),
            parent_schema: Some(parent_schema.to_string()),
            parent_table: parent_table.to_string(),
            parent_column: parent_column.to_string(),
        });
        self
    }

    #[must_use]
    pub const fn rows(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    #[must_use]
    pub fn auto_increment(mut self, column: &str) -> Self {
        self.auto_increment.push(column.to_string());
        self
    }

    fn matches(&self, table: TableRef<'_>) -> bool {
        self.name.eq_ignore_ascii_case(table.name)
            && match (table.schema, self.schema.as_deref()) {
                (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
                _ => true,
            }
    }
}

/// A catalog snapshot held entirely in memory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemorySource {
    /// The schema under analysis.
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub tables: Vec<MemoryTable>,
    #[serde(default)]
    pub check_constraints: Vec<CheckConstraintRow>,
    #[serde(default)]
    pub table_ids: Vec<TableIdRow>,
    #[serde(default)]
    pub index_ids: Vec<IndexIdRow>,
    #[serde(default)]
    pub table_comments: Vec<CommentRow>,
    #[serde(default)]
    pub column_comments: Vec<CommentRow>,
    #[serde(default)]
    pub failures: Vec<FailureRule>,
}

impl MemorySource {
    #[must_use]
    pub fn new(schema: Option<&str>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            ..Self::default()
        }
    }

    /// Parse a JSON catalog dump.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid catalog document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut source: Self = serde_json::from_str(json)?;
        let tables = std::mem::take(&mut source.tables);
        for table in tables {
            source = source.with_table(table);
        }
        Ok(source)
    }

    /// Add a table. Unset schemas on the table and its foreign key rows
    /// default to the table's schema, which defaults to the source's.
    #[must_use]
    pub fn with_table(mut self, mut table: MemoryTable) -> Self {
        if table.schema.is_none() {
            table.schema.clone_from(&self.schema);
        }
        for row in &mut table.foreign_keys {
            if row.child_schema.is_none() {
                row.child_schema.clone_from(&table.schema);
            }
            if row.parent_schema.is_none() {
                row.parent_schema.clone_from(&table.schema);
            }
        }
        self.tables.push(table);
        self
    }

    /// Make `fetch` fail for `table` (every table when `None`).
    #[must_use]
    pub fn failing(mut self, fetch: Fetch, table: Option<&str>) -> Self {
        self.failures.push(FailureRule {
            fetch,
            table: table.map(str::to_string),
        });
        self
    }

    #[must_use]
    pub fn with_check_constraint(mut self, table: &str, name: &str, text: &str) -> Self {
        self.check_constraints.push(CheckConstraintRow {
            table: table.to_string(),
            name: name.to_string(),
            text: text.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_table_comment(mut self, table: &str, comments: &str) -> Self {
        self.table_comments.push(CommentRow {
            table: table.to_string(),
            column: None,
            comments: Some(comments.to_string()),
        });
        self
    }

    #[must_use]
    pub fn with_column_comment(mut self, table: &str, column: &str, comments: &str) -> Self {
        self.column_comments.push(CommentRow {
            table: table.to_string(),
            column: Some(column.to_string()),
            comments: Some(comments.to_string()),
        });
        self
    }

    fn check(&self, fetch: Fetch, table: Option<&str>) -> Result<(), SourceError> {
        let failed = self.failures.iter().any(|rule| {
            rule.fetch == fetch
                && match (&rule.table, table) {
                    (None, _) => true,
                    (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
                    (Some(_), None) => false,
                }
        });
        if failed {
            return Err(SourceError::query(fetch.what(), "injected failure"));
        }
        Ok(())
    }

    fn find(&self, table: TableRef<'_>) -> Option<&MemoryTable> {
        self.tables
            .iter()
            .find(|candidate| candidate.matches(table))
    }

    fn per_table<T: Clone>(
        &self,
        fetch: Fetch,
        table: TableRef<'_>,
        rows: impl FnOnce(&MemoryTable) -> Vec<T>,
    ) -> Result<Vec<T>, SourceError> {
        self.check(fetch, Some(table.name))?;
        Ok(self.find(table).map(rows).unwrap_or_default())
    }

    fn in_schema(&self, table: &MemoryTable) -> bool {
        match (self.schema.as_deref(), table.schema.as_deref()) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

impl MetadataSource for MemorySource {
    fn tables(&self) -> Result<Vec<TableDescriptor>, SourceError> {
        self.check(Fetch::Tables, None)?;
        Ok(self
            .tables
            .iter()
            .filter(|table| self.in_schema(table))
            .map(|table| TableDescriptor {
                schema: table.schema.clone(),
                name: table.name.clone(),
                kind: table.kind,
                remarks: table.remarks.clone(),
            })
            .collect())
    }

    fn columns(&self, table: TableRef<'_>) -> Result<Vec<ColumnRow>, SourceError> {
        self.per_table(Fetch::Columns, table, |t| t.columns.clone())
    }

    fn indexes(&self, table: TableRef<'_>) -> Result<Vec<IndexRow>, SourceError> {
        self.per_table(Fetch::Indexes, table, |t| t.indexes.clone())
    }

    fn primary_keys(&self, table: TableRef<'_>) -> Result<Vec<PrimaryKeyRow>, SourceError> {
        self.per_table(Fetch::PrimaryKeys, table, |t| t.primary_keys.clone())
    }

    fn imported_keys(&self, table: TableRef<'_>) -> Result<Vec<ForeignKeyRow>, SourceError> {
        self.per_table(Fetch::ImportedKeys, table, |t| t.foreign_keys.clone())
    }

    fn exported_keys(&self, table: TableRef<'_>) -> Result<Vec<ForeignKeyRow>, SourceError> {
        self.check(Fetch::ExportedKeys, Some(table.name))?;
        Ok(self
            .tables
            .iter()
            .flat_map(|child| child.foreign_keys.iter())
            .filter(|row| {
                row.parent_table.eq_ignore_ascii_case(table.name)
                    && match (table.schema, row.parent_schema.as_deref()) {
                        (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
                        _ => true,
                    }
            })
            .cloned()
            .collect())
    }

    fn row_count(&self, table: TableRef<'_>) -> Result<Option<u64>, SourceError> {
        self.check(Fetch::RowCount, Some(table.name))?;
        Ok(self.find(table).and_then(|t| t.row_count))
    }

    fn auto_increment_columns(&self, table: TableRef<'_>) -> Result<Vec<String>, SourceError> {
        self.per_table(Fetch::AutoIncrement, table, |t| t.auto_increment.clone())
    }

    fn check_constraints(&self) -> Result<Vec<CheckConstraintRow>, SourceError> {
        self.check(Fetch::CheckConstraints, None)?;
        Ok(self.check_constraints.clone())
    }

    fn table_ids(&self) -> Result<Vec<TableIdRow>, SourceError> {
        self.check(Fetch::TableIds, None)?;
        Ok(self.table_ids.clone())
    }

    fn index_ids(&self) -> Result<Vec<IndexIdRow>, SourceError> {
        self.check(Fetch::IndexIds, None)?;
        Ok(self.index_ids.clone())
    }

    fn table_comments(&self) -> Result<Vec<CommentRow>, SourceError> {
        self.check(Fetch::TableComments, None)?;
        Ok(self.table_comments.clone())
    }

    fn column_comments(&self) -> Result<Vec<CommentRow>, SourceError> {
        self.check(Fetch::ColumnComments, None)?;
        Ok(self.column_comments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemorySource {
        MemorySource::new(Some("app"))
            .with_table(
                MemoryTable::new("orders")
                    .column(ColumnRow::new("id", "int4", 10).not_null())
                    .primary_key("orders_pk", &["id"]),
            )
            .with_table(
                MemoryTable::new("line_items")
                    .column(ColumnRow::new("id", "int4", 10).not_null())
                    .column(ColumnRow::new("order_id", "int4", 10))
                    .foreign_key("line_items_order_fk", "order_id", "orders", "id"),
            )
            .with_table(
                MemoryTable::new("currencies")
                    .in_schema("ref")
                    .column(ColumnRow::new("code", "bpchar", 3)),
            )
    }

    #[test]
    fn enumerates_only_the_schema_under_analysis() {
        let names: Vec<String> = sample()
            .tables()
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["orders", "line_items"]);
    }

    #[test]
    fn assigns_ordinals_in_insertion_order() {
        let source = sample();
        let columns = source
            .columns(TableRef::new(Some("app"), "LINE_ITEMS"))
            .unwrap();
        let ordinals: Vec<u32> = columns.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
    }

    #[test]
    fn foreign_keys_default_to_table_schema() {
        let source = sample();
        let rows = source
            .imported_keys(TableRef::new(Some("app"), "line_items"))
            .unwrap();
        assert_eq!(rows[0].parent_schema.as_deref(), Some("app"));
        assert_eq!(rows[0].child_schema.as_deref(), Some("app"));

        let exported = source
            .exported_keys(TableRef::new(Some("app"), "orders"))
            .unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].child_table, "line_items");
    }

    #[test]
    fn injected_failures_are_scoped_to_table() {
        let source = sample().failing(Fetch::Columns, Some("orders"));
        assert!(source.columns(TableRef::new(None, "orders")).is_err());
        assert!(source.columns(TableRef::new(None, "line_items")).is_ok());
    }

    #[test]
    fn parses_json_dump() {
        let json = r#"{
            "schema": "app",
            "tables": [
                {
                    "name": "orders",
                    "columns": [{ "name": "id", "type_name": "int4", "length": 10, "ordinal": 1 }],
                    "foreign_keys": [{
                        "constraint_name": "orders_customer_fk",
                        "child_table": "orders",
                        "child_column": "customer_id",
                        "parent_table": "customers",
                        "parent_column": "id"
                    }]
                }
            ]
        }"#;
        let source = MemorySource::from_json(json).unwrap();
        assert_eq!(source.tables[0].schema.as_deref(), Some("app"));
        assert_eq!(
            source.tables[0].foreign_keys[0].parent_schema.as_deref(),
            Some("app")
        );
        assert!(source.tables[0].columns[0].nullable);
    }
}
