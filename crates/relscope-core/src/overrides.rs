//! User-supplied metadata corrections.
//!
//! Catalogs are often incomplete: foreign keys are enforced by the
//! application instead of declared, comments are missing, or generic key
//! names produce bogus implied relationships. A [`SchemaMeta`] document
//! fixes that up after linking:
//!
//! ```toml
//! [[tables]]
//! name = "orders"
//! comments = "Customer orders"
//!
//! [[tables.columns]]
//! name = "customer_id"
//! disable_implied_keys = "from"
//!
//! [[tables.columns.foreign_keys]]
//! table = "customers"
//! column = "id"
//! remote_schema = "crm"
//! ```
//!
//! Unknown tables and columns are logged and skipped.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::linker::resolve_remote;
use crate::loader::LoadOptions;
use crate::model::{Schema, TableId};
use crate::source::MetadataSource;

/// Root of a metadata overrides document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMeta {
    #[serde(default)]
    pub tables: Vec<TableMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    #[serde(default)]
    pub comments: Option<String>,
    /// The table lives in this other schema and should be loaded as a remote
    /// table.
    #[serde(default)]
    pub remote_schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<TableColumnMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnMeta {
    pub name: String,
    #[serde(default)]
    pub comments: Option<String>,
    /// Add this column to the table's primary key.
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub disable_implied_keys: Option<ImpliedKeys>,
    #[serde(default)]
    pub exclude_from_diagrams: bool,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyMeta>,
}

/// Which implied relationships to suppress for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpliedKeys {
    /// Nothing may be implied to reference this column.
    To,
    /// This column may not be implied to reference anything.
    From,
    All,
}

impl ImpliedKeys {
    const fn disables_parents(self) -> bool {
        matches!(self, Self::From | Self::All)
    }

    const fn disables_children(self) -> bool {
        matches!(self, Self::To | Self::All)
    }
}

/// A foreign key the catalog does not declare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyMeta {
    /// Parent table.
    pub table: String,
    /// Parent column.
    pub column: String,
    #[serde(default)]
    pub remote_schema: Option<String>,
}

impl SchemaMeta {
    /// Parse an overrides document.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not a valid overrides document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse metadata overrides")
    }
}

/// Read a metadata overrides file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_overrides(path: &Path) -> Result<SchemaMeta> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<SchemaMeta>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Apply `meta` to a loaded and linked schema.
///
/// Remote tables named by `remote_schema` are loaded from `source` first so
/// that later foreign keys can reference them.
#[instrument(skip_all, fields(tables = meta.tables.len()))]
pub fn apply_overrides<S>(source: &S, schema: &mut Schema, meta: &SchemaMeta, options: &LoadOptions)
where
    S: MetadataSource + ?Sized,
{
    for table_meta in &meta.tables {
        if let Some(remote_schema) = &table_meta.remote_schema {
            if let Err(failure) = resolve_remote(
                source,
                schema,
                Some(remote_schema.as_str()),
                &table_meta.name,
                true,
                options,
            ) {
                warn!(%failure, "explicit remote table unavailable");
            }
        }
    }

    for table_meta in &meta.tables {
        let table = table_meta.remote_schema.as_deref().map_or_else(
            || schema.table_named(&table_meta.name),
            |remote_schema| schema.remote_table_named(Some(remote_schema), &table_meta.name),
        );
        let Some(table) = table else {
            warn!(table = %table_meta.name, "overrides name an unknown table");
            continue;
        };

        if table_meta.comments.is_some() {
            schema
                .table_mut(table)
                .set_comments(table_meta.comments.as_deref());
        }
        for column_meta in &table_meta.columns {
            apply_column(source, schema, table, column_meta, options);
        }
    }
}

fn apply_column<S>(
    source: &S,
    schema: &mut Schema,
    table: TableId,
    meta: &TableColumnMeta,
    options: &LoadOptions,
) where
    S: MetadataSource + ?Sized,
{
    let Some(column) = schema.column_named(table, &meta.name) else {
        warn!(
            table = %schema.table(table).name,
            column = %meta.name,
            "overrides name an unknown column"
        );
        return;
    };

    if meta.comments.is_some() {
        schema
            .column_mut(column)
            .set_comments(meta.comments.as_deref());
    }
    if meta.primary_key {
        schema.add_primary_key(column);
    }

    let flags = &mut schema.column_mut(column).flags;
    if let Some(disabled) = meta.disable_implied_keys {
        flags.implied_parents_disabled = disabled.disables_parents();
        flags.implied_children_disabled = disabled.disables_children();
    }
    flags.excluded = meta.exclude_from_diagrams;

    for fk in &meta.foreign_keys {
        let parent_table = match &fk.remote_schema {
            Some(remote_schema) => match resolve_remote(
                source,
                schema,
                Some(remote_schema.as_str()),
                &fk.table,
                true,
                options,
            ) {
                Ok(remote) => Some(remote),
                Err(failure) => {
                    warn!(%failure, "foreign key override parent unavailable");
                    None
                }
            },
            None => schema.table_named(&fk.table),
        };
        let parent = parent_table.and_then(|parent| schema.column_named(parent, &fk.column));
        let Some(parent) = parent else {
            warn!(
                table = %fk.table,
                column = %fk.column,
                "foreign key override references an unknown column"
            );
            continue;
        };

        let name = format!(
            "{}.{} -> {}.{}",
            schema.table(table).name,
            schema.column(column).name,
            schema.table(schema.column(parent).table()).name,
            schema.column(parent).name,
        );
        let constraint = schema.add_foreign_key(table, &name);
        schema.link(constraint, parent, column);
        debug!(constraint = %name, "foreign key added from overrides");
    }
}
