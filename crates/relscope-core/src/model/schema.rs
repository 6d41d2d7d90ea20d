use std::cmp::Ordering;

use petgraph::Direction;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

use crate::names::{CaseInsensitiveMap, normalize};

use super::{
    Column, ColumnFlags, ColumnId, ConstraintId, ForeignKeyConstraint, Index, Table, TableDraft,
    TableId, TableKind, clean_comments,
};

/// The complete entity graph of one analyzed schema.
///
/// Local tables and views are registered by case-insensitive name. Remote
/// tables are registered separately by `SCHEMA.NAME` and never appear in
/// [`Schema::tables`].
#[derive(Debug, Clone)]
pub struct Schema {
    database: String,
    schema_name: Option<String>,
    tables: Vec<Table>,
    columns: Vec<Column>,
    constraints: Vec<ForeignKeyConstraint>,
    registry: CaseInsensitiveMap<TableId>,
    remotes: CaseInsensitiveMap<TableId>,
    links: StableDiGraph<ColumnId, ConstraintId>,
}

impl Schema {
    #[must_use]
    pub fn new(database: &str, schema: Option<&str>) -> Self {
        Self {
            database: database.to_string(),
            schema_name: schema.map(str::to_string),
            tables: Vec::new(),
            columns: Vec::new(),
            constraints: Vec::new(),
            registry: CaseInsensitiveMap::new(),
            remotes: CaseInsensitiveMap::new(),
            links: StableDiGraph::new(),
        }
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a local table or view.
    ///
    /// A second table with the same case-insensitive name is ignored and the
    /// existing id returned.
    pub fn add_table(&mut self, draft: TableDraft) -> TableId {
        if let Some(existing) = self.registry.get(&draft.name) {
            warn!(table = %draft.name, "duplicate table name, keeping the first");
            return *existing;
        }
        let kind = if draft.view {
            TableKind::View
        } else {
            TableKind::Table
        };
        let name = draft.name.clone();
        let id = self.materialize(draft, kind);
        self.registry.insert(&name, id);
        id
    }

    /// Register a table from another schema, returning the existing one when
    /// it is already known.
    pub fn add_remote_table(
        &mut self,
        draft: TableDraft,
        base_schema: Option<&str>,
        explicit: bool,
    ) -> TableId {
        let key = remote_key(draft.schema.as_deref(), &draft.name);
        if let Some(existing) = self.remotes.get(&key) {
            return *existing;
        }
        let kind = TableKind::Remote {
            base_schema: base_schema.map(str::to_string),
            explicit,
        };
        let id = self.materialize(draft, kind);
        self.remotes.insert(&key, id);
        id
    }

    fn materialize(&mut self, draft: TableDraft, kind: TableKind) -> TableId {
        let id = TableId(self.tables.len());
        let mut table = Table::new(draft.schema, draft.name, kind);
        table.comments = clean_comments(draft.comments.as_deref());
        table.row_count = draft.row_count;

        let mut columns = draft.columns;
        columns.sort_by_key(|column| column.ordinal);
        for column in columns {
            if table.column_index.contains_key(&column.name) {
                debug!(table = %table.name, column = %column.name, "duplicate column ignored");
                continue;
            }
            let column_id = ColumnId(self.columns.len());
            let node = self.links.add_node(column_id);
            table.columns.push(column_id);
            table.column_index.insert(&column.name, column_id);
            self.columns.push(Column {
                table: id,
                node,
                name: column.name,
                type_name: column.type_name,
                length: column.length,
                decimal_digits: column.decimal_digits,
                nullable: column.nullable,
                auto_updated: column.auto_updated,
                default_value: column.default_value,
                comments: clean_comments(column.comments.as_deref()),
                ordinal: column.ordinal,
                flags: ColumnFlags::default(),
            });
        }

        for index in draft.indexes {
            let columns = index
                .columns
                .iter()
                .filter_map(|(name, direction)| {
                    table.column(name).map(|column| (column, *direction))
                })
                .collect();
            table.indexes.insert(
                &index.name,
                Index {
                    name: index.name.clone(),
                    unique: index.unique,
                    primary_key: index.primary_key,
                    id: None,
                    columns,
                },
            );
        }

        for key in &draft.primary_keys {
            match table.column(key) {
                Some(column) if !table.primary_keys.contains(&column) => {
                    table.primary_keys.push(column);
                }
                Some(_) => {}
                None => warn!(table = %table.name, column = %key, "primary key column not found"),
            }
        }

        self.tables.push(table);
        id
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    #[must_use]
    pub fn column(&self, id: ColumnId) -> &Column {
        &self.columns[id.0]
    }

    pub fn column_mut(&mut self, id: ColumnId) -> &mut Column {
        &mut self.columns[id.0]
    }

    #[must_use]
    pub fn constraint(&self, id: ConstraintId) -> &ForeignKeyConstraint {
        &self.constraints[id.0]
    }

    /// Case-insensitive lookup of a local table or view.
    #[must_use]
    pub fn table_named(&self, name: &str) -> Option<TableId> {
        self.registry.get(name).copied()
    }

    #[must_use]
    pub fn remote_table_named(&self, schema: Option<&str>, name: &str) -> Option<TableId> {
        self.remotes.get(&remote_key(schema, name)).copied()
    }

    #[must_use]
    pub fn column_named(&self, table: TableId, name: &str) -> Option<ColumnId> {
        self.table(table).column(name)
    }

    /// Local tables and views ordered by upper-cased name.
    #[must_use]
    pub fn tables(&self) -> Vec<TableId> {
        self.registry.values().copied().collect()
    }

    /// Remote tables ordered by upper-cased `SCHEMA.NAME`.
    #[must_use]
    pub fn remote_tables(&self) -> Vec<TableId> {
        self.remotes.values().copied().collect()
    }

    /// Number of local tables that are not views.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.registry
            .values()
            .filter(|id| !self.table(**id).is_view())
            .count()
    }

    #[must_use]
    pub fn view_count(&self) -> usize {
        self.registry
            .values()
            .filter(|id| self.table(**id).is_view())
            .count()
    }

    /// Every constraint ever created, declared and implied, in creation order.
    pub fn constraints(&self) -> impl Iterator<Item = ConstraintId> {
        (0..self.constraints.len()).map(ConstraintId)
    }

    /// Order columns by (table name, column name), both case-insensitive.
    #[must_use]
    pub fn compare_columns(&self, a: ColumnId, b: ColumnId) -> Ordering {
        let (left, right) = (self.column(a), self.column(b));
        normalize(&self.table(left.table).name)
            .cmp(&normalize(&self.table(right.table).name))
            .then_with(|| normalize(&left.name).cmp(&normalize(&right.name)))
            .then_with(|| a.cmp(&b))
    }

    // -----------------------------------------------------------------------
    // Constraints and links
    // -----------------------------------------------------------------------

    /// Find or create the declared constraint `name` on child table `table`.
    pub fn add_foreign_key(&mut self, table: TableId, name: &str) -> ConstraintId {
        if let Some(existing) = self.table(table).foreign_key(name) {
            return existing;
        }
        let id = ConstraintId(self.constraints.len());
        self.constraints
            .push(ForeignKeyConstraint::new(name.to_string(), table, false));
        self.table_mut(table).foreign_keys.insert(name, id);
        id
    }

    /// Create an implied constraint and link `parent` to `child` with it.
    ///
    /// Implied constraints are not registered in the child table's foreign
    /// key map.
    pub fn add_implied_constraint(&mut self, parent: ColumnId, child: ColumnId) -> ConstraintId {
        let child_column = self.column(child);
        let child_table = child_column.table;
        let name = format!(
            "implied:{}.{}",
            self.table(child_table).name,
            child_column.name
        );
        let id = ConstraintId(self.constraints.len());
        self.constraints
            .push(ForeignKeyConstraint::new(name, child_table, true));
        self.link(id, parent, child);
        id
    }

    /// Link `parent` to `child` through `constraint`.
    ///
    /// Both directions are recorded at once. An existing link between the
    /// same pair is re-pointed at `constraint`. Each call bumps the parent
    /// table's `max_children` and the child table's `max_parents`.
    pub fn link(&mut self, constraint: ConstraintId, parent: ColumnId, child: ColumnId) {
        let (from, to) = (self.column(parent).node, self.column(child).node);
        if let Some(edge) = self.links.find_edge(from, to) {
            self.links[edge] = constraint;
        } else {
            self.links.add_edge(from, to, constraint);
        }

        let parent_table = self.column(parent).table;
        let child_table = self.column(child).table;
        self.tables[parent_table.0].max_children += 1;
        self.tables[child_table.0].max_parents += 1;

        let fk = &mut self.constraints[constraint.0];
        fk.parent_table.get_or_insert(parent_table);
        fk.parent_columns.push(parent);
        fk.child_columns.push(child);
    }

    /// Remove the link between `parent` and `child` in both directions.
    ///
    /// Returns the constraint that carried it. `max_parents`/`max_children`
    /// are left unchanged.
    pub fn unlink(&mut self, parent: ColumnId, child: ColumnId) -> Option<ConstraintId> {
        let (from, to) = (self.column(parent).node, self.column(child).node);
        let edge = self.links.find_edge(from, to)?;
        self.links.remove_edge(edge)
    }

    /// Parent columns of `column` with the linking constraint, ordered by
    /// (table name, column name).
    #[must_use]
    pub fn parents(&self, column: ColumnId) -> Vec<(ColumnId, ConstraintId)> {
        self.neighbors(column, Direction::Incoming)
    }

    /// Child columns of `column` with the linking constraint, ordered by
    /// (table name, column name).
    #[must_use]
    pub fn children(&self, column: ColumnId) -> Vec<(ColumnId, ConstraintId)> {
        self.neighbors(column, Direction::Outgoing)
    }

    fn neighbors(&self, column: ColumnId, direction: Direction) -> Vec<(ColumnId, ConstraintId)> {
        let node = self.column(column).node;
        let mut related: Vec<_> = self
            .links
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (self.links[other], *edge.weight())
            })
            .collect();
        related.sort_by(|a, b| self.compare_columns(a.0, b.0));
        related
    }

    /// The constraint by which `child` references `parent`, if linked.
    #[must_use]
    pub fn parent_constraint(&self, child: ColumnId, parent: ColumnId) -> Option<ConstraintId> {
        let (from, to) = (self.column(parent).node, self.column(child).node);
        self.links
            .find_edge(from, to)
            .and_then(|edge| self.links.edge_weight(edge).copied())
    }

    /// The constraint by which `child` references `parent`, seen from the
    /// parent side. Always equal to [`Schema::parent_constraint`].
    #[must_use]
    pub fn child_constraint(&self, parent: ColumnId, child: ColumnId) -> Option<ConstraintId> {
        self.parent_constraint(child, parent)
    }

    #[must_use]
    pub fn parent_count(&self, column: ColumnId) -> usize {
        let node = self.column(column).node;
        self.links.edges_directed(node, Direction::Incoming).count()
    }

    #[must_use]
    pub fn child_count(&self, column: ColumnId) -> usize {
        let node = self.column(column).node;
        self.links.edges_directed(node, Direction::Outgoing).count()
    }

    // -----------------------------------------------------------------------
    // Column queries
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn is_primary(&self, column: ColumnId) -> bool {
        let table = self.column(column).table;
        self.table(table).primary_keys.contains(&column)
    }

    /// True when some unique index consists of exactly this column.
    #[must_use]
    pub fn is_unique(&self, column: ColumnId) -> bool {
        let table = self.column(column).table;
        self.table(table).indexes().any(|index| {
            index.unique && index.columns.len() == 1 && index.columns[0].0 == column
        })
    }

    /// `table.column`, the form column patterns are matched against.
    #[must_use]
    pub fn column_label(&self, column: ColumnId) -> String {
        let column = self.column(column);
        format!("{}.{}", self.table(column.table).name, column.name)
    }

    /// Apply `pattern` to the column's `table.column` label.
    pub fn column_matches(&self, column: ColumnId, pattern: impl Fn(&str) -> bool) -> bool {
        pattern(&self.column_label(column))
    }

    /// True when the column is the child side of any link.
    #[must_use]
    pub fn is_foreign_key(&self, column: ColumnId) -> bool {
        self.parent_count(column) > 0
    }

    /// Add `column` to its table's primary key when not already part of it.
    pub fn add_primary_key(&mut self, column: ColumnId) {
        let table = self.column(column).table;
        let keys = &mut self.tables[table.0].primary_keys;
        if !keys.contains(&column) {
            keys.push(column);
        }
    }

    // -----------------------------------------------------------------------
    // Table queries
    // -----------------------------------------------------------------------

    fn links_of(&self, table: TableId, direction: Direction) -> Vec<ConstraintId> {
        self.table(table)
            .columns
            .iter()
            .flat_map(|column| {
                let node = self.column(*column).node;
                self.links
                    .edges_directed(node, direction)
                    .map(|edge| *edge.weight())
            })
            .collect()
    }

    /// Current number of parent links over all of the table's columns.
    #[must_use]
    pub fn num_parents(&self, table: TableId) -> usize {
        self.links_of(table, Direction::Incoming).len()
    }

    #[must_use]
    pub fn num_children(&self, table: TableId) -> usize {
        self.links_of(table, Direction::Outgoing).len()
    }

    /// Parent links carried by declared (not implied) constraints.
    #[must_use]
    pub fn num_real_parents(&self, table: TableId) -> usize {
        self.links_of(table, Direction::Incoming)
            .into_iter()
            .filter(|constraint| !self.constraint(*constraint).implied)
            .count()
    }

    #[must_use]
    pub fn num_real_children(&self, table: TableId) -> usize {
        self.links_of(table, Direction::Outgoing)
            .into_iter()
            .filter(|constraint| !self.constraint(*constraint).implied)
            .count()
    }

    /// No parents.
    #[must_use]
    pub fn is_root(&self, table: TableId) -> bool {
        self.num_parents(table) == 0
    }

    /// No children.
    #[must_use]
    pub fn is_leaf(&self, table: TableId) -> bool {
        self.num_children(table) == 0
    }

    /// Remove every parent link of the table's columns. Returns the number
    /// removed.
    pub fn unlink_parents(&mut self, table: TableId) -> usize {
        self.unlink_all(table, Direction::Incoming)
    }

    pub fn unlink_children(&mut self, table: TableId) -> usize {
        self.unlink_all(table, Direction::Outgoing)
    }

    fn unlink_all(&mut self, table: TableId, direction: Direction) -> usize {
        let edges: Vec<_> = self
            .table(table)
            .columns
            .iter()
            .flat_map(|column| {
                let node = self.column(*column).node;
                self.links
                    .edges_directed(node, direction)
                    .map(|edge| edge.id())
            })
            .collect();
        let removed = edges.len();
        for edge in edges {
            self.links.remove_edge(edge);
        }
        removed
    }

    /// Declared constraints of the given tables, ordered by (child table
    /// name, constraint name).
    #[must_use]
    pub fn declared_constraints(&self, tables: &[TableId]) -> Vec<ConstraintId> {
        let mut constraints: Vec<_> = tables
            .iter()
            .flat_map(|table| self.table(*table).foreign_keys())
            .collect();
        constraints.sort_by(|a, b| {
            let (a, b) = (self.constraint(*a), self.constraint(*b));
            normalize(&self.table(a.table).name)
                .cmp(&normalize(&self.table(b.table).name))
                .then_with(|| normalize(&a.name).cmp(&normalize(&b.name)))
        });
        constraints.dedup();
        constraints
    }
}

fn remote_key(schema: Option<&str>, name: &str) -> String {
    format!("{}.{name}", schema.unwrap_or_default())
}
