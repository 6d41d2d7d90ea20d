//! Relationship neighbourhoods of a table, ready for rendering.
//!
//! # Overview
//!
//! A [`SubgraphBuilder`] walks the linked column graph around a focal table
//! and returns a [`Subgraph`]: the tables to draw and the column-level edges
//! between them.
//!
//! - **One degree**: the focal table plus every table directly linked to it
//!   through a visible link. All links between the focal table and those
//!   relatives become edges.
//! - **Two degrees**: additionally, each relative's own relatives
//!   ("cousins") that are not already included. A cousin is connected only to
//!   the relative that discovered it.
//! - **Whole schema**: every non-orphan local table, with every link among
//!   them.
//!
//! A link is visible when neither end is excluded and it is either declared
//! or implied links are requested. Edge endpoints carry an [`Anchor`] telling
//! the renderer where to attach: the focal table's per-column detail, a
//! cousin's title, or a plain column port.
//!
//! Node and edge order is deterministic for a given graph.

use std::collections::{BTreeMap, BTreeSet};

use relscope_core::names::normalize;
use relscope_core::{Column, ColumnId, ConstraintId, Schema, Table, TableId};
use serde::Serialize;
use tracing::debug;

use crate::anomalies::is_orphan;
use crate::{base_tables, sort_tables};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Where an edge attaches to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    /// The column's own port.
    Column,
    /// The per-column detail section of the focal table.
    Detail,
    /// The table title, used two hops away.
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub table: String,
    pub column: String,
    pub anchor: Anchor,
}

/// One parent/child column link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubgraphEdge {
    pub constraint: String,
    pub parent: Endpoint,
    pub child: Endpoint,
    pub implied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubgraphNode {
    pub table: String,
    pub schema: Option<String>,
    /// Draw every column (only the focal table).
    pub detailed: bool,
    /// Touched by at least one implied edge.
    pub has_implied: bool,
    pub view: bool,
    /// Distance from the focal table; `None` in whole-schema mode.
    pub degree: Option<u8>,
}

#[allow(clippy::struct_excessive_bools)] // flat fields read by renderers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    /// Focal table name, `None` for the whole schema.
    pub focus: Option<String>,
    pub include_implied: bool,
    pub two_degrees: bool,
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<SubgraphEdge>,
    /// `table.column` labels of excluded columns met during the walk.
    pub excluded_columns: Vec<String>,
    /// Some implied link was seen.
    pub found_implied: bool,
    /// Some implied link was seen and left out.
    pub skipped_implied: bool,
    pub table_count: usize,
    pub view_count: usize,
}

impl Subgraph {
    #[must_use]
    pub fn node(&self, table: &str) -> Option<&SubgraphNode> {
        self.nodes
            .iter()
            .find(|node| node.table.eq_ignore_ascii_case(table))
    }

    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.node(table).is_some()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// A link between two columns, parent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Link {
    parent: ColumnId,
    child: ColumnId,
    constraint: ConstraintId,
}

/// Walk state shared across one build.
#[derive(Default)]
struct Walk {
    excluded: BTreeSet<ColumnId>,
    found_implied: bool,
    skipped_implied: bool,
}

type ExcludeFn<'a> = Box<dyn Fn(&Table, &Column) -> bool + 'a>;

/// Computes [`Subgraph`]s over one schema.
pub struct SubgraphBuilder<'a> {
    schema: &'a Schema,
    include_implied: bool,
    two_degrees: bool,
    exclude: ExcludeFn<'a>,
}

impl<'a> SubgraphBuilder<'a> {
    /// Declared links only, one degree, excluding columns flagged
    /// `exclude_from_diagrams`.
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            include_implied: false,
            two_degrees: false,
            exclude: Box::new(|_, column| column.flags.excluded),
        }
    }

    #[must_use]
    pub const fn include_implied(mut self, include: bool) -> Self {
        self.include_implied = include;
        self
    }

    #[must_use]
    pub const fn two_degrees(mut self, two_degrees: bool) -> Self {
        self.two_degrees = two_degrees;
        self
    }

    /// Replace the exclusion predicate. Links touching a matching column are
    /// left out of every subgraph.
    #[must_use]
    pub fn exclude(mut self, predicate: impl Fn(&Table, &Column) -> bool + 'a) -> Self {
        self.exclude = Box::new(predicate);
        self
    }

    /// The neighbourhood of `focus`.
    #[must_use]
    pub fn focused(&self, focus: TableId) -> Subgraph {
        let mut walk = Walk::default();
        let mut degrees = BTreeMap::from([(focus, 0_u8)]);
        let (relatives, mut links) = self.relatives(focus, &mut walk);
        for relative in &relatives {
            degrees.insert(*relative, 1);
        }

        if self.two_degrees {
            let mut ordered: Vec<_> = relatives.iter().copied().collect();
            sort_tables(self.schema, &mut ordered);
            for relative in ordered {
                let (cousins, cousin_links) = self.relatives(relative, &mut walk);
                let added: BTreeSet<_> = cousins
                    .into_iter()
                    .filter(|cousin| !degrees.contains_key(cousin))
                    .collect();
                for cousin in &added {
                    degrees.insert(*cousin, 2);
                }
                links.extend(
                    cousin_links
                        .into_iter()
                        .filter(|link| added.contains(&self.other_table(link, relative))),
                );
            }
        }

        debug!(
            table = %self.schema.table(focus).name,
            tables = degrees.len(),
            links = links.len(),
            two_degrees = self.two_degrees,
            "subgraph built"
        );
        self.finish(Some(focus), &degrees, links, walk)
    }

    /// Every non-orphan local table and the links among them.
    #[must_use]
    pub fn whole_schema(&self) -> Subgraph {
        let schema = self.schema;
        let mut walk = Walk::default();
        let included: Vec<_> = base_tables(schema)
            .into_iter()
            .filter(|table| !is_orphan(schema, *table, self.include_implied))
            .collect();
        let members: BTreeSet<_> = included.iter().copied().collect();

        let mut links = Vec::new();
        for table in &included {
            for column in schema.table(*table).columns() {
                if self.is_excluded(*column, &mut walk) {
                    continue;
                }
                for (parent, constraint) in schema.parents(*column) {
                    let link = Link {
                        parent,
                        child: *column,
                        constraint,
                    };
                    if members.contains(&schema.column(parent).table())
                        && self.is_visible(&link, parent, &mut walk)
                    {
                        links.push(link);
                    }
                }
            }
        }

        let degrees: BTreeMap<_, _> = included.into_iter().map(|table| (table, 0)).collect();
        self.finish(None, &degrees, links, walk)
    }

    /// Tables linked to `table` through visible links, and those links.
    fn relatives(&self, table: TableId, walk: &mut Walk) -> (BTreeSet<TableId>, Vec<Link>) {
        let schema = self.schema;
        let mut relatives = BTreeSet::new();
        let mut links = Vec::new();

        for column in schema.table(table).columns() {
            let column = *column;
            if self.is_excluded(column, walk) {
                continue;
            }
            let mut neighbours = Vec::new();
            for (parent, constraint) in schema.parents(column) {
                let link = Link {
                    parent,
                    child: column,
                    constraint,
                };
                neighbours.push((parent, link));
            }
            for (child, constraint) in schema.children(column) {
                let link = Link {
                    parent: column,
                    child,
                    constraint,
                };
                neighbours.push((child, link));
            }

            for (other, link) in neighbours {
                let other_table = schema.column(other).table();
                if other_table == table || !self.is_visible(&link, other, walk) {
                    continue;
                }
                relatives.insert(other_table);
                links.push(link);
            }
        }
        (relatives, links)
    }

    fn is_excluded(&self, column: ColumnId, walk: &mut Walk) -> bool {
        let value = self.schema.column(column);
        let excluded = (self.exclude)(self.schema.table(value.table()), value);
        if excluded {
            walk.excluded.insert(column);
        }
        excluded
    }

    /// Whether `link` should be drawn; `other` is its far end.
    fn is_visible(&self, link: &Link, other: ColumnId, walk: &mut Walk) -> bool {
        if self.schema.constraint(link.constraint).is_implied() {
            walk.found_implied = true;
            if !self.include_implied {
                walk.skipped_implied = true;
                return false;
            }
        }
        !self.is_excluded(other, walk)
    }

    fn other_table(&self, link: &Link, table: TableId) -> TableId {
        let parent_table = self.schema.column(link.parent).table();
        if parent_table == table {
            self.schema.column(link.child).table()
        } else {
            parent_table
        }
    }

    fn finish(
        &self,
        focus: Option<TableId>,
        degrees: &BTreeMap<TableId, u8>,
        mut links: Vec<Link>,
        walk: Walk,
    ) -> Subgraph {
        let schema = self.schema;
        links.sort_unstable();
        links.dedup();

        let anchor = |column: ColumnId| {
            let table = schema.column(column).table();
            match (focus, degrees.get(&table)) {
                (Some(focus), _) if focus == table => Anchor::Detail,
                (Some(_), Some(2)) => Anchor::Title,
                _ => Anchor::Column,
            }
        };
        let endpoint = |column: ColumnId| {
            let value = schema.column(column);
            Endpoint {
                table: schema.table(value.table()).name.clone(),
                column: value.name.clone(),
                anchor: anchor(column),
            }
        };

        let mut touched_by_implied = BTreeSet::new();
        let mut edges: Vec<_> = links
            .iter()
            .map(|link| {
                let implied = schema.constraint(link.constraint).is_implied();
                if implied {
                    touched_by_implied.insert(schema.column(link.parent).table());
                    touched_by_implied.insert(schema.column(link.child).table());
                }
                SubgraphEdge {
                    constraint: schema.constraint(link.constraint).name().to_string(),
                    parent: endpoint(link.parent),
                    child: endpoint(link.child),
                    implied,
                }
            })
            .collect();
        edges.sort_by(|a, b| edge_key(a).cmp(&edge_key(b)));

        let mut tables: Vec<_> = degrees.keys().copied().collect();
        sort_tables(schema, &mut tables);
        let nodes: Vec<_> = tables
            .into_iter()
            .map(|id| {
                let table = schema.table(id);
                SubgraphNode {
                    table: table.name.clone(),
                    schema: table.schema.clone(),
                    detailed: focus == Some(id),
                    has_implied: touched_by_implied.contains(&id),
                    view: table.is_view(),
                    degree: focus.and(degrees.get(&id).copied()),
                }
            })
            .collect();

        let view_count = nodes.iter().filter(|node| node.view).count();
        let mut excluded: Vec<_> = walk.excluded.into_iter().collect();
        excluded.sort_by(|a, b| schema.compare_columns(*a, *b));

        Subgraph {
            focus: focus.map(|table| schema.table(table).name.clone()),
            include_implied: self.include_implied,
            two_degrees: focus.is_some() && self.two_degrees,
            table_count: nodes.len() - view_count,
            view_count,
            nodes,
            edges,
            excluded_columns: excluded
                .into_iter()
                .map(|column| schema.column_label(column))
                .collect(),
            found_implied: walk.found_implied,
            skipped_implied: walk.skipped_implied,
        }
    }
}

/// Parent table, child table, constraint, parent column, child column.
fn edge_key(edge: &SubgraphEdge) -> (String, String, &str, String, String) {
    (
        normalize(&edge.parent.table),
        normalize(&edge.child.table),
        edge.constraint.as_str(),
        normalize(&edge.parent.column),
        normalize(&edge.child.column),
    )
}
