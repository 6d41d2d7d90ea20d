#![forbid(unsafe_code)]
//! relscope-analysis library.
//!
//! Works on a loaded [`relscope_core::Schema`]:
//!
//! - [`implied`]: infer undeclared foreign keys from matching key columns.
//! - [`anomalies`]: structural smells (orphans, missing indexes, ...).
//! - [`prune`]: edge-removal primitives for cycle breaking.
//! - [`subgraph`]: one- and two-degree relationship neighbourhoods for
//!   rendering.
//! - [`analysis`]: runs all of the above in order and collects the results.
//!
//! Everything here is single-threaded and deterministic for a given graph.

pub mod analysis;
pub mod anomalies;
pub mod implied;
pub mod prune;
pub mod subgraph;

pub use analysis::{Analysis, AnalysisOptions, ImpliedLink, SubgraphKey, analyze};
pub use anomalies::AnomalyReport;
pub use implied::infer_implied_constraints;
pub use prune::{remove_a_foreign_key_constraint, remove_self_referencing_constraint};
pub use subgraph::{Anchor, Subgraph, SubgraphBuilder, SubgraphEdge, SubgraphNode};

use relscope_core::names::normalize;
use relscope_core::{Schema, TableId};

/// Sort tables by case-insensitive name.
pub(crate) fn sort_tables(schema: &Schema, tables: &mut [TableId]) {
    tables.sort_by(|a, b| {
        let (a_name, b_name) = (&schema.table(*a).name, &schema.table(*b).name);
        normalize(a_name)
            .cmp(&normalize(b_name))
            .then_with(|| a_name.cmp(b_name))
            .then_with(|| a.cmp(b))
    });
}

/// Local tables that are not views, ordered by name.
pub(crate) fn base_tables(schema: &Schema) -> Vec<TableId> {
    schema
        .tables()
        .into_iter()
        .filter(|table| !schema.table(*table).is_view())
        .collect()
}
