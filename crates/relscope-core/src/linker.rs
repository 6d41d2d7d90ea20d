//! Second-pass resolution of declared foreign keys into column links.
//!
//! Runs after every local table exists. Imported-key rows are grouped by
//! constraint name; each row whose child and parent columns both resolve
//! becomes one `(parent, child)` pair of that constraint. Rows that cannot be
//! resolved are logged and skipped, so a constraint only ever holds complete
//! pairs.
//!
//! With multiple schemas enabled, a parent in another schema is loaded as a
//! remote table, and exported keys are used to discover remote children.
//! A remote table's own foreign keys are connected back to the schema under
//! analysis on a best-effort basis: failures there are swallowed.

use tracing::{debug, instrument, warn};

use crate::error::TableFailure;
use crate::loader::{LoadOptions, construct_table};
use crate::model::{Schema, TableId};
use crate::source::{ForeignKeyRow, MetadataSource, RelationKind, TableDescriptor, TableRef};

/// Link the declared foreign keys of every local table.
///
/// Returns the tables whose foreign keys could not be read.
#[instrument(skip_all)]
pub(crate) fn link_schema<S>(
    source: &S,
    schema: &mut Schema,
    options: &LoadOptions,
) -> Vec<TableFailure>
where
    S: MetadataSource + ?Sized,
{
    let mut failures = Vec::new();
    for table in schema.tables() {
        if schema.table(table).is_view() {
            continue;
        }
        let (table_schema, name) = {
            let table = schema.table(table);
            (table.schema.clone(), table.name.clone())
        };
        let table_ref = TableRef::new(table_schema.as_deref(), &name);

        match source.imported_keys(table_ref) {
            Ok(rows) => link_rows(source, schema, table, rows, options, &mut failures),
            Err(error) => {
                warn!(table = %name, error = %error, "foreign keys unavailable");
                failures.push(TableFailure {
                    schema: table_schema.clone(),
                    table: name.clone(),
                    kind: "table",
                    error,
                });
            }
        }

        if options.multiple_schemas && table_schema.is_some() {
            match source.exported_keys(table_ref) {
                Ok(rows) => {
                    for row in rows {
                        let child_schema = row.child_schema.as_deref();
                        if !in_other_schema(child_schema, table_schema.as_deref()) {
                            continue;
                        }
                        if let Err(failure) = resolve_remote(
                            source,
                            schema,
                            child_schema,
                            &row.child_table,
                            false,
                            options,
                        ) {
                            failures.push(failure);
                        }
                    }
                }
                Err(error) => {
                    warn!(table = %name, error = %error, "exported keys unavailable");
                    failures.push(TableFailure {
                        schema: table_schema.clone(),
                        table: name.clone(),
                        kind: "table",
                        error,
                    });
                }
            }
        }
    }
    failures
}

/// Find or load the remote table `schema_name.name` and connect its foreign
/// keys that reference the schema under analysis.
///
/// # Errors
///
/// Returns a [`TableFailure`] when the remote table's columns or primary keys
/// cannot be read.
pub(crate) fn resolve_remote<S>(
    source: &S,
    schema: &mut Schema,
    schema_name: Option<&str>,
    name: &str,
    explicit: bool,
    options: &LoadOptions,
) -> Result<TableId, TableFailure>
where
    S: MetadataSource + ?Sized,
{
    if let Some(existing) = schema.remote_table_named(schema_name, name) {
        return Ok(existing);
    }

    let descriptor = TableDescriptor {
        schema: schema_name.map(str::to_string),
        name: name.to_string(),
        kind: RelationKind::Table,
        remarks: None,
    };
    let draft = construct_table(source, &descriptor, options, true).map_err(|error| {
        warn!(schema = ?schema_name, table = %name, error = %error, "remote table unavailable");
        TableFailure {
            schema: descriptor.schema.clone(),
            table: descriptor.name.clone(),
            kind: "remote table",
            error,
        }
    })?;

    let base = schema.schema().map(str::to_string);
    let remote = schema.add_remote_table(draft, base.as_deref(), explicit);
    debug!(schema = ?schema_name, table = %name, "remote table added");

    match source.imported_keys(descriptor.table_ref()) {
        Ok(rows) => {
            let rows = rows
                .into_iter()
                .filter(|row| {
                    matches!(
                        (row.parent_schema.as_deref(), base.as_deref()),
                        (Some(parent), Some(base)) if parent.eq_ignore_ascii_case(base)
                    )
                })
                .collect();
            let mut ignored = Vec::new();
            link_rows(source, schema, remote, rows, options, &mut ignored);
        }
        Err(error) => {
            debug!(
                schema = ?schema_name,
                table = %name,
                error = %error,
                "remote foreign keys ignored"
            );
        }
    }
    Ok(remote)
}

fn link_rows<S>(
    source: &S,
    schema: &mut Schema,
    child_table: TableId,
    rows: Vec<ForeignKeyRow>,
    options: &LoadOptions,
    failures: &mut Vec<TableFailure>,
) where
    S: MetadataSource + ?Sized,
{
    let remote_child = schema.table(child_table).is_remote();
    for row in rows {
        let Some(name) = row.constraint_name.as_deref() else {
            debug!(table = %row.child_table, "unnamed foreign key row skipped");
            continue;
        };
        let Some(child) = schema.column_named(child_table, &row.child_column) else {
            warn!(
                table = %row.child_table,
                column = %row.child_column,
                constraint = %name,
                "unknown child column"
            );
            continue;
        };

        let child_schema = schema.table(child_table).schema.clone();
        let parent_schema = row.parent_schema.as_deref();
        let cross_schema = in_other_schema(parent_schema, child_schema.as_deref());
        let parent_table = if !remote_child && cross_schema {
            if !options.multiple_schemas {
                warn!(
                    table = %row.child_table,
                    parent_schema = ?parent_schema,
                    parent_table = %row.parent_table,
                    "parent in another schema, cross-schema resolution disabled"
                );
                continue;
            }
            match resolve_remote(source, schema, parent_schema, &row.parent_table, false, options) {
                Ok(remote) => Some(remote),
                Err(failure) => {
                    failures.push(failure);
                    None
                }
            }
        } else {
            schema.table_named(&row.parent_table)
        };

        let Some(parent_table) = parent_table else {
            warn!(
                table = %row.child_table,
                parent_table = %row.parent_table,
                constraint = %name,
                "unknown parent table"
            );
            continue;
        };
        let Some(parent) = schema.column_named(parent_table, &row.parent_column) else {
            warn!(
                table = %row.child_table,
                parent_table = %row.parent_table,
                parent_column = %row.parent_column,
                constraint = %name,
                "unknown parent column"
            );
            continue;
        };

        let constraint = schema.add_foreign_key(child_table, name);
        schema.link(constraint, parent, child);
    }
}

const fn in_other_schema(candidate: Option<&str>, home: Option<&str>) -> bool {
    matches!(
        (candidate, home),
        (Some(candidate), Some(home)) if !candidate.eq_ignore_ascii_case(home)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_schema;
    use crate::source::ColumnRow;
    use crate::source::memory::{Fetch, MemorySource, MemoryTable};

    fn load(source: &MemorySource, options: &LoadOptions) -> crate::loader::Loaded {
        load_schema(source, "db", Some("app"), options).unwrap()
    }

    #[test]
    fn composite_key_rows_form_one_constraint() {
        let source = MemorySource::new(Some("app"))
            .with_table(
                MemoryTable::new("shipments")
                    .column(ColumnRow::new("region", "char", 2))
                    .column(ColumnRow::new("number", "int", 10))
                    .primary_key("shipments_pk", &["region", "number"]),
            )
            .with_table(
                MemoryTable::new("parcels")
                    .column(ColumnRow::new("ship_region", "char", 2))
                    .column(ColumnRow::new("ship_number", "int", 10))
                    .foreign_key("parcels_fk", "ship_region", "shipments", "region")
                    .foreign_key("parcels_fk", "ship_number", "shipments", "number"),
            );
        let loaded = load(&source, &LoadOptions::sequential());
        let schema = &loaded.schema;
        let parcels = schema.table_named("parcels").unwrap();
        let fk = schema.table(parcels).foreign_key("PARCELS_FK").unwrap();
        let constraint = schema.constraint(fk);

        let names: Vec<_> = constraint
            .child_columns()
            .iter()
            .map(|column| schema.column(*column).name.as_str())
            .collect();
        assert_eq!(names, ["ship_region", "ship_number"]);
        assert_eq!(constraint.parent_columns().len(), 2);
        assert_eq!(schema.table(parcels).max_parents(), 2);
    }

    #[test]
    fn unknown_parent_is_skipped() {
        let source = MemorySource::new(Some("app")).with_table(
            MemoryTable::new("orders")
                .column(ColumnRow::new("customer_id", "int", 10))
                .foreign_key("orders_customer_fk", "customer_id", "customers", "id"),
        );
        let loaded = load(&source, &LoadOptions::sequential());
        let orders = loaded.schema.table_named("orders").unwrap();
        assert_eq!(loaded.schema.table(orders).foreign_keys().count(), 0);
        assert!(loaded.report.is_clean());
    }

    #[test]
    fn imported_key_failure_is_reported() {
        let source = MemorySource::new(Some("app"))
            .with_table(MemoryTable::new("orders").column(ColumnRow::new("id", "int", 10)))
            .failing(Fetch::ImportedKeys, Some("orders"));
        let loaded = load(&source, &LoadOptions::sequential());
        assert!(loaded.schema.table_named("orders").is_some());
        assert_eq!(loaded.report.link_failures.len(), 1);
    }

    fn cross_schema_source() -> MemorySource {
        MemorySource::new(Some("app"))
            .with_table(
                MemoryTable::new("orders")
                    .column(ColumnRow::new("id", "int", 10))
                    .column(ColumnRow::new("customer_id", "int", 10))
                    .primary_key("orders_pk", &["id"])
                    .remote_foreign_key(
                        "orders_customer_fk",
                        "customer_id",
                        "crm",
                        "customers",
                        "id",
                    ),
            )
            .with_table(
                MemoryTable::new("customers")
                    .in_schema("crm")
                    .column(ColumnRow::new("id", "int", 10))
                    .primary_key("customers_pk", &["id"]),
            )
            .with_table(
                MemoryTable::new("invoices")
                    .in_schema("billing")
                    .column(ColumnRow::new("order_id", "int", 10))
                    .remote_foreign_key("invoices_order_fk", "order_id", "app", "orders", "id"),
            )
    }

    #[test]
    fn cross_schema_parent_needs_multiple_schemas() {
        let loaded = load(&cross_schema_source(), &LoadOptions::sequential());
        assert!(loaded.schema.remote_tables().is_empty());
        let orders = loaded.schema.table_named("orders").unwrap();
        assert_eq!(loaded.schema.num_parents(orders), 0);
    }

    #[test]
    fn remote_parent_and_child_are_resolved() {
        let options = LoadOptions::sequential().with_multiple_schemas(true);
        let loaded = load(&cross_schema_source(), &options);
        let schema = &loaded.schema;

        let customers = schema.remote_table_named(Some("crm"), "customers").unwrap();
        let invoices = schema
            .remote_table_named(Some("billing"), "invoices")
            .unwrap();
        let orders = schema.table_named("orders").unwrap();
        assert!(schema.table(customers).is_remote());
        assert_eq!(schema.num_parents(orders), 1);
        assert_eq!(schema.num_children(orders), 1);
        assert_eq!(schema.num_parents(invoices), 1);
        assert_eq!(schema.tables().len(), 1);
    }

    #[test]
    fn remote_back_link_failures_are_swallowed() {
        let source = cross_schema_source().failing(Fetch::ImportedKeys, Some("invoices"));
        let options = LoadOptions::sequential().with_multiple_schemas(true);
        let loaded = load(&source, &options);
        assert!(loaded.report.is_clean());
        let invoices = loaded
            .schema
            .remote_table_named(Some("billing"), "invoices")
            .unwrap();
        assert_eq!(loaded.schema.num_parents(invoices), 0);
    }

    #[test]
    fn in_other_schema_ignores_unknown_schemas() {
        assert!(in_other_schema(Some("crm"), Some("app")));
        assert!(!in_other_schema(Some("APP"), Some("app")));
        assert!(!in_other_schema(None, Some("app")));
        assert!(!in_other_schema(Some("crm"), None));
    }
}
