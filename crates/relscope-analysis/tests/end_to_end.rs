use relscope_analysis::{
    Anchor, AnalysisOptions, SubgraphKey, analyze, infer_implied_constraints,
    remove_a_foreign_key_constraint, remove_self_referencing_constraint,
};
use relscope_core::source::{ColumnRow, MemorySource, MemoryTable};
use relscope_core::{LoadOptions, SchemaMeta, apply_overrides, load_schema};

fn catalog() -> MemorySource {
    MemorySource::new(Some("app"))
        .with_table(
            MemoryTable::new("customers")
                .column(ColumnRow::new("customer_id", "int", 10))
                .column(ColumnRow::new("phone1", "varchar", 20))
                .column(ColumnRow::new("phone2", "varchar", 20))
                .primary_key("customers_pk", &["customer_id"]),
        )
        .with_table(
            MemoryTable::new("orders")
                .column(ColumnRow::new("order_id", "int", 10))
                .column(ColumnRow::new("customer_id", "int", 10))
                .primary_key("orders_pk", &["order_id"])
                .foreign_key("orders_customer_fk", "customer_id", "customers", "customer_id"),
        )
        .with_table(
            MemoryTable::new("line_items")
                .column(ColumnRow::new("item_id", "int", 10))
                .column(ColumnRow::new("order_id", "int", 10))
                .column(ColumnRow::new("product_id", "int", 10))
                .primary_key("line_items_pk", &["item_id"]),
        )
        .with_table(
            MemoryTable::new("products")
                .column(ColumnRow::new("product_id", "int", 10))
                .primary_key("products_pk", &["product_id"]),
        )
        .with_table(
            MemoryTable::new("employees")
                .column(ColumnRow::new("employee_id", "int", 10))
                .column(ColumnRow::new("manager_id", "int", 10))
                .primary_key("employees_pk", &["employee_id"])
                .foreign_key("employees_manager_fk", "manager_id", "employees", "employee_id"),
        )
}

#[test]
fn load_infer_and_render_neighbourhoods() {
    let source = catalog();
    let options = LoadOptions::default().with_threads(3);
    let mut schema = load_schema(&source, "shop", Some("app"), &options)
        .unwrap()
        .schema;

    let analysis = analyze(&mut schema, &AnalysisOptions::default());

    // line_items.order_id and line_items.product_id match single-column keys.
    let mut implied: Vec<_> = analysis
        .implied
        .iter()
        .map(|link| (link.parent.table.as_str(), link.child.column.as_str()))
        .collect();
    implied.sort_unstable();
    assert_eq!(implied, [("orders", "order_id"), ("products", "product_id")]);

    assert_eq!(analysis.anomalies.incrementing_column_names, ["customers"]);
    assert_eq!(analysis.anomalies.orphans_without_implied, ["line_items", "products"]);

    let focused = analysis
        .subgraph(&SubgraphKey::table("orders", false, true))
        .unwrap();
    let names: Vec<_> = focused
        .nodes
        .iter()
        .map(|node| node.table.as_str())
        .collect();
    assert_eq!(names, ["customers", "orders"]);
    assert!(focused.skipped_implied);

    let with_implied = analysis
        .subgraph(&SubgraphKey::table("orders", true, true))
        .unwrap();
    let names: Vec<_> = with_implied
        .nodes
        .iter()
        .map(|node| node.table.as_str())
        .collect();
    assert_eq!(names, ["customers", "line_items", "orders", "products"]);
    let products_edge = with_implied
        .edges
        .iter()
        .find(|edge| edge.parent.table == "products")
        .unwrap();
    assert_eq!(products_edge.parent.anchor, Anchor::Title);
}

#[test]
fn overrides_suppress_inference_and_hide_columns() {
    let source = catalog();
    let options = LoadOptions::sequential();
    let mut schema = load_schema(&source, "shop", Some("app"), &options)
        .unwrap()
        .schema;
    let meta = SchemaMeta::from_toml(
        r#"
[[tables]]
name = "line_items"

[[tables.columns]]
name = "product_id"
disable_implied_keys = "from"

[[tables]]
name = "orders"

[[tables.columns]]
name = "customer_id"
exclude_from_diagrams = true
"#,
    )
    .unwrap();
    apply_overrides(&source, &mut schema, &meta, &options);

    let analysis = analyze(&mut schema, &AnalysisOptions::default());
    assert_eq!(analysis.implied.len(), 1);
    assert_eq!(analysis.implied[0].child.column, "order_id");

    let customers = analysis
        .subgraph(&SubgraphKey::table("customers", false, false))
        .unwrap();
    assert_eq!(customers.nodes.len(), 1);
    assert_eq!(customers.excluded_columns, ["orders.customer_id"]);
}

#[test]
fn pruning_removes_links_but_keeps_counters() {
    let source = catalog();
    let mut schema = load_schema(&source, "shop", Some("app"), &LoadOptions::sequential())
        .unwrap()
        .schema;

    let employees = schema.table_named("employees").unwrap();
    assert!(remove_self_referencing_constraint(&mut schema, employees).is_some());
    assert_eq!(schema.num_parents(employees), 0);

    // orders gains an implied child, so it sits between two links.
    infer_implied_constraints(&mut schema);
    let orders = schema.table_named("orders").unwrap();
    assert_eq!(schema.num_parents(orders), schema.num_children(orders));
    let removed = remove_a_foreign_key_constraint(&mut schema, orders).unwrap();
    assert_eq!(schema.constraint(removed).name(), "orders_customer_fk");
    assert!(schema.is_root(orders));

    assert_eq!(schema.num_children(orders), 1);
    assert_eq!(schema.table(orders).max_parents(), 1);
}
