#![forbid(unsafe_code)]
//! relscope-core library.
//!
//! Builds an in-memory relationship graph over the tables and columns of a
//! relational schema from an external [`source::MetadataSource`].
//!
//! ## Pipeline
//!
//! ```text
//! MetadataSource (catalog cursor)
//!        ↓  loader::load_schema()
//! table construction (bounded worker pool, join barrier)
//!        ↓
//! schema-wide supplementary data (comments, ids, checks)
//!        ↓  linker::link_schema()
//! Schema (tables, columns, indexes, linked foreign keys)
//!        ↓  overrides::apply_overrides()   (optional)
//! Schema ready for analysis
//! ```
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums for library failures, `anyhow::Result` for
//!   file-based configuration.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod error;
pub mod linker;
pub mod loader;
pub mod model;
pub mod names;
pub mod overrides;
pub mod source;

pub use config::{AnalyzerConfig, load_config};
pub use error::{ErrorCode, LoadError, SourceError, TableFailure};
pub use loader::{LoadOptions, LoadReport, Loaded, load_schema};
pub use model::{
    Column, ColumnId, ConstraintId, ForeignKeyConstraint, Index, Schema, SortDirection, Table,
    TableId, TableKind,
};
pub use overrides::{SchemaMeta, apply_overrides, load_overrides};
