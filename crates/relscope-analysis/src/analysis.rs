//! One-call analysis of a loaded schema.
//!
//! [`analyze`] infers implied constraints into the graph, runs every anomaly
//! detector and computes the subgraphs a renderer needs: the whole schema
//! plus one- and two-degree neighbourhoods of every local table. Everything
//! in [`Analysis`] serializes to JSON.

use std::collections::BTreeMap;
use std::fmt;

use relscope_core::{ConstraintId, Schema};
use serde::{Serialize, Serializer};
use tracing::{info, instrument};

use crate::anomalies::{AnomalyReport, ColumnRef};
use crate::base_tables;
use crate::implied::infer_implied_constraints;
use crate::subgraph::{Subgraph, SubgraphBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Run implied-constraint inference first.
    pub infer_implied: bool,
    /// Build per-table subgraphs in addition to the whole-schema ones.
    pub per_table_subgraphs: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            infer_implied: true,
            per_table_subgraphs: true,
        }
    }
}

/// Identifies one subgraph of an [`Analysis`].
///
/// Serializes as `focus:real|implied:1|2` with `*` for the whole schema, so
/// it can key a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubgraphKey {
    pub focus: Option<String>,
    pub include_implied: bool,
    pub two_degrees: bool,
}

impl SubgraphKey {
    #[must_use]
    pub const fn whole_schema(include_implied: bool) -> Self {
        Self {
            focus: None,
            include_implied,
            two_degrees: false,
        }
    }

    #[must_use]
    pub fn table(name: &str, include_implied: bool, two_degrees: bool) -> Self {
        Self {
            focus: Some(name.to_string()),
            include_implied,
            two_degrees,
        }
    }

    fn of(subgraph: &Subgraph) -> Self {
        Self {
            focus: subgraph.focus.clone(),
            include_implied: subgraph.include_implied,
            two_degrees: subgraph.two_degrees,
        }
    }
}

impl fmt::Display for SubgraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.focus.as_deref().unwrap_or("*"),
            if self.include_implied { "implied" } else { "real" },
            if self.two_degrees { 2 } else { 1 },
        )
    }
}

impl Serialize for SubgraphKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An inferred relationship by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpliedLink {
    pub constraint: String,
    pub parent: ColumnRef,
    pub child: ColumnRef,
}

impl ImpliedLink {
    fn all(schema: &Schema, constraint: ConstraintId) -> Vec<Self> {
        let value = schema.constraint(constraint);
        value
            .pairs()
            .map(|(parent, child)| Self {
                constraint: value.name().to_string(),
                parent: ColumnRef::new(schema, parent),
                child: ColumnRef::new(schema, child),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub database: String,
    pub schema: Option<String>,
    pub table_count: usize,
    pub view_count: usize,
    /// Relationships added by inference, in creation order.
    pub implied: Vec<ImpliedLink>,
    pub anomalies: AnomalyReport,
    pub subgraphs: BTreeMap<SubgraphKey, Subgraph>,
}

impl Analysis {
    #[must_use]
    pub fn subgraph(&self, key: &SubgraphKey) -> Option<&Subgraph> {
        self.subgraphs.get(key)
    }
}

/// Analyze `schema`, merging inferred constraints into it.
#[instrument(skip_all, fields(database = %schema.database()))]
pub fn analyze(schema: &mut Schema, options: &AnalysisOptions) -> Analysis {
    let implied = if options.infer_implied {
        infer_implied_constraints(schema)
    } else {
        Vec::new()
    };
    let schema = &*schema;

    let tables = base_tables(schema);
    let anomalies = AnomalyReport::collect(schema, &tables);

    let mut subgraphs = BTreeMap::new();
    let mut insert = |subgraph: Subgraph| {
        subgraphs.insert(SubgraphKey::of(&subgraph), subgraph);
    };

    let real = SubgraphBuilder::new(schema).whole_schema();
    let any_implied = real.skipped_implied
        || schema
            .constraints()
            .any(|constraint| schema.constraint(constraint).is_implied());
    insert(real);
    if any_implied {
        let builder = SubgraphBuilder::new(schema).include_implied(true);
        insert(builder.whole_schema());
    }

    if options.per_table_subgraphs {
        let one = SubgraphBuilder::new(schema);
        let two = SubgraphBuilder::new(schema).two_degrees(true);
        let two_implied = SubgraphBuilder::new(schema)
            .two_degrees(true)
            .include_implied(true);
        for table in schema.tables() {
            insert(one.focused(table));
            let second = two.focused(table);
            let has_implied = second.skipped_implied;
            insert(second);
            if has_implied {
                insert(two_implied.focused(table));
            }
        }
    }

    let implied: Vec<_> = implied
        .into_iter()
        .flat_map(|constraint| ImpliedLink::all(schema, constraint))
        .collect();
    info!(
        implied = implied.len(),
        anomalies = anomalies.len(),
        subgraphs = subgraphs.len(),
        "analysis complete"
    );

    Analysis {
        database: schema.database().to_string(),
        schema: schema.schema().map(str::to_string),
        table_count: schema.table_count(),
        view_count: schema.view_count(),
        implied,
        anomalies,
        subgraphs,
    }
}
