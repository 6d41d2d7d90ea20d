//! Concurrent schema loading.
//!
//! # Overview
//!
//! [`load_schema`] turns a [`MetadataSource`] into a linked [`Schema`]:
//!
//! 1. Enumerate table and view descriptors (a failure here is fatal).
//! 2. Drop filtered, `$`-named and duplicate descriptors.
//! 3. Construct every table. With one worker this happens on the caller.
//!    With `N > 1` workers the first table is constructed on the caller
//!    ("priming", a failure there is fatal) and the rest are fed through a
//!    rendezvous channel to `N` scoped worker threads, so at most `N`
//!    constructions are ever in flight and the dispatcher blocks while all
//!    workers are busy. Leaving the thread scope is the join barrier.
//! 4. Register the constructed tables, apply schema-wide supplementary data
//!    and link foreign keys ([`crate::linker`]).
//!
//! A table whose columns or primary keys cannot be read is left out and
//! recorded in the [`LoadReport`]; its siblings are unaffected.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crossbeam_channel::bounded;
use tracing::{debug, info, instrument, warn};

use crate::config::AnalyzerConfig;
use crate::error::{LoadError, SourceError, TableFailure, qualified};
use crate::linker;
use crate::model::{ColumnDraft, Schema, TableDraft};
use crate::names::{CaseInsensitiveMap, normalize};
use crate::source::{MetadataSource, RelationKind, TableDescriptor};

type TableFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Settings for one [`load_schema`] run.
#[allow(clippy::struct_excessive_bools)] // mirrors AnalyzerConfig
#[derive(Clone)]
pub struct LoadOptions {
    /// Maximum concurrent table constructions (`1` = sequential).
    pub threads: usize,
    pub row_counts: bool,
    pub multiple_schemas: bool,
    pub views: bool,
    pub skip_dollar_names: bool,
    table_filter: Option<TableFilter>,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("threads", &self.threads)
            .field("row_counts", &self.row_counts)
            .field("multiple_schemas", &self.multiple_schemas)
            .field("views", &self.views)
            .field("skip_dollar_names", &self.skip_dollar_names)
            .field("table_filter", &self.table_filter.is_some())
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from(&AnalyzerConfig::default())
    }
}

impl From<&AnalyzerConfig> for LoadOptions {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            threads: config.worker_count(),
            row_counts: config.row_counts,
            multiple_schemas: config.multiple_schemas,
            views: config.views,
            skip_dollar_names: config.skip_dollar_names,
            table_filter: None,
        }
    }
}

impl LoadOptions {
    /// Default options with a single worker.
    #[must_use]
    pub fn sequential() -> Self {
        Self::default().with_threads(1)
    }

    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub const fn with_multiple_schemas(mut self, enabled: bool) -> Self {
        self.multiple_schemas = enabled;
        self
    }

    /// Only load tables whose name satisfies `filter`.
    #[must_use]
    pub fn with_table_filter(
        mut self,
        filter: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.table_filter = Some(Arc::new(filter));
        self
    }

    fn worker_count(&self) -> usize {
        self.threads.max(1)
    }

    fn accepts(&self, name: &str) -> bool {
        self.table_filter.as_ref().is_none_or(|filter| filter(name))
    }
}

/// Absorbed failures of a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Tables left out because their columns or primary keys were unreadable.
    pub failures: Vec<TableFailure>,
    /// Tables whose foreign keys could not be read; they are loaded but
    /// their relationships are incomplete.
    pub link_failures: Vec<TableFailure>,
    /// Descriptors dropped by filtering, in enumeration order.
    pub skipped: Vec<String>,
}

impl LoadReport {
    /// No table was dropped or left partially linked.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.link_failures.is_empty()
    }
}

/// The result of [`load_schema`].
#[derive(Debug, Clone)]
pub struct Loaded {
    pub schema: Schema,
    pub report: LoadReport,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Load and link every table of `schema` from `source`.
///
/// # Errors
///
/// Returns [`LoadError::TableEnumeration`] when the table list cannot be
/// read, [`LoadError::PrimedTable`] when the first table fails while loading
/// concurrently, and [`LoadError::ThreadPool`] when a worker thread cannot be
/// started.
#[instrument(skip(source, options), fields(threads = options.threads))]
pub fn load_schema<S>(
    source: &S,
    database: &str,
    schema: Option<&str>,
    options: &LoadOptions,
) -> Result<Loaded, LoadError>
where
    S: MetadataSource + ?Sized,
{
    let mut report = LoadReport::default();
    let descriptors = source.tables().map_err(LoadError::TableEnumeration)?;
    let descriptors = select(descriptors, options, &mut report.skipped);
    debug!(count = descriptors.len(), "constructing tables");

    let sink = Sink::default();
    let mut pending = descriptors.into_iter();
    if options.worker_count() == 1 {
        for descriptor in pending {
            let built = construct_table(source, &descriptor, options, false);
            sink.accept(&descriptor, built);
        }
    } else {
        if let Some(first) = pending.next() {
            let draft = construct_table(source, &first, options, false).map_err(|error| {
                LoadError::PrimedTable {
                    table: qualified(first.schema.as_deref(), &first.name),
                    source: error,
                }
            })?;
            sink.register(draft);
        }
        run_pool(source, pending.collect(), options, &sink)?;
    }

    let (drafts, failures) = sink.into_parts();
    report.failures = failures;

    let mut result = Schema::new(database, schema);
    for draft in drafts.into_values() {
        result.add_table(draft);
    }
    load_supplementary(source, &mut result);
    report.link_failures = linker::link_schema(source, &mut result, options);

    info!(
        tables = result.table_count(),
        views = result.view_count(),
        failed = report.failures.len(),
        "schema loaded"
    );
    Ok(Loaded {
        schema: result,
        report,
    })
}

fn select(
    descriptors: Vec<TableDescriptor>,
    options: &LoadOptions,
    skipped: &mut Vec<String>,
) -> Vec<TableDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .into_iter()
        .filter(|descriptor| {
            let name = &descriptor.name;
            let keep = if descriptor.kind == RelationKind::View && !options.views {
                false
            } else if options.skip_dollar_names && name.contains('$') {
                debug!(table = %name, "skipping name containing '$'");
                false
            } else if !options.accepts(name) {
                false
            } else if !seen.insert(normalize(name)) {
                warn!(table = %name, "duplicate table name in catalog, ignoring");
                false
            } else {
                true
            };
            if !keep {
                skipped.push(name.clone());
            }
            keep
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Sink {
    registry: Mutex<CaseInsensitiveMap<TableDraft>>,
    failures: Mutex<Vec<TableFailure>>,
}

impl Sink {
    fn register(&self, draft: TableDraft) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let name = draft.name.clone();
        registry.insert(&name, draft);
    }

    fn accept(&self, descriptor: &TableDescriptor, built: Result<TableDraft, SourceError>) {
        match built {
            Ok(draft) => self.register(draft),
            Err(error) => {
                let failure = TableFailure {
                    schema: descriptor.schema.clone(),
                    table: descriptor.name.clone(),
                    kind: kind_label(descriptor.kind),
                    error,
                };
                warn!(%failure, "table omitted");
                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(failure);
            }
        }
    }

    fn into_parts(self) -> (CaseInsensitiveMap<TableDraft>, Vec<TableFailure>) {
        let registry = self
            .registry
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut failures = self
            .failures
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        failures.sort_by(|a, b| normalize(&a.table).cmp(&normalize(&b.table)));
        (registry, failures)
    }
}

fn run_pool<S>(
    source: &S,
    descriptors: Vec<TableDescriptor>,
    options: &LoadOptions,
    sink: &Sink,
) -> Result<(), LoadError>
where
    S: MetadataSource + ?Sized,
{
    let workers = options.worker_count().min(descriptors.len());
    if workers == 0 {
        return Ok(());
    }

    thread::scope(|scope| -> Result<(), LoadError> {
        // Rendezvous: a send completes only when an idle worker takes it.
        let (tx, rx) = bounded::<TableDescriptor>(0);
        for n in 0..workers {
            let rx = rx.clone();
            thread::Builder::new()
                .name(format!("relscope-loader-{n}"))
                .spawn_scoped(scope, move || {
                    while let Ok(descriptor) = rx.recv() {
                        let built = construct_table(source, &descriptor, options, false);
                        sink.accept(&descriptor, built);
                    }
                })
                .map_err(LoadError::ThreadPool)?;
        }
        drop(rx);

        for descriptor in descriptors {
            if tx.send(descriptor).is_err() {
                break;
            }
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Table construction
// ---------------------------------------------------------------------------

/// Fetch one table's columns, indexes and primary keys, in that order.
///
/// Column and primary key failures are returned; index, auto-increment and
/// row count failures are logged and defaulted. Views and remote tables get
/// no indexes, auto-increment flags or row count.
pub(crate) fn construct_table<S>(
    source: &S,
    descriptor: &TableDescriptor,
    options: &LoadOptions,
    remote: bool,
) -> Result<TableDraft, SourceError>
where
    S: MetadataSource + ?Sized,
{
    let table = descriptor.table_ref();
    let mut draft = TableDraft::new(descriptor.schema.as_deref(), &descriptor.name);
    draft.view = descriptor.kind == RelationKind::View;
    draft.comments.clone_from(&descriptor.remarks);
    let supplementary = !draft.view && !remote;

    draft.columns = source
        .columns(table)?
        .into_iter()
        .map(ColumnDraft::from)
        .collect();

    if supplementary {
        match source.indexes(table) {
            Ok(rows) => {
                for row in rows.into_iter().filter(|row| !row.statistic) {
                    if let (Some(index), Some(column)) = (row.index_name, row.column) {
                        draft.add_index_column(&index, row.unique, &column, row.direction);
                    }
                }
            }
            Err(err) => warn!(
                table = %descriptor.name,
                code = %err.code(),
                error = %err,
                "indexes unavailable"
            ),
        }
    }

    for row in source.primary_keys(table)? {
        if let Some(name) = &row.constraint_name {
            draft.mark_primary_index(name);
        }
        draft.primary_keys.push(row.column);
    }

    if supplementary {
        match source.auto_increment_columns(table) {
            Ok(names) => {
                for name in names {
                    if let Some(column) = draft
                        .columns
                        .iter_mut()
                        .find(|column| column.name.eq_ignore_ascii_case(&name))
                    {
                        column.auto_updated = true;
                    }
                }
            }
            Err(err) => {
                warn!(
                    table = %descriptor.name,
                    code = %err.code(),
                    error = %err,
                    "auto-increment detection failed"
                );
            }
        }

        if options.row_counts {
            match source.row_count(table) {
                Ok(count) => draft.row_count = count,
                Err(err) => warn!(
                    table = %descriptor.name,
                    code = %err.code(),
                    error = %err,
                    "row count unavailable"
                ),
            }
        }
    }

    Ok(draft)
}

const fn kind_label(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Table => "table",
        RelationKind::View => "view",
    }
}

// ---------------------------------------------------------------------------
// Schema-wide supplementary data
// ---------------------------------------------------------------------------

fn load_supplementary<S>(source: &S, schema: &mut Schema)
where
    S: MetadataSource + ?Sized,
{
    match source.check_constraints() {
        Ok(rows) => {
            for row in rows {
                if let Some(table) = schema.table_named(&row.table) {
                    schema
                        .table_mut(table)
                        .check_constraints
                        .insert(row.name, row.text);
                }
            }
        }
        Err(err) => warn!(code = %err.code(), error = %err, "check constraints unavailable"),
    }

    match source.table_ids() {
        Ok(rows) => {
            for row in rows {
                if let Some(table) = schema.table_named(&row.table) {
                    schema.table_mut(table).id = Some(row.id);
                }
            }
        }
        Err(err) => warn!(code = %err.code(), error = %err, "table ids unavailable"),
    }

    match source.index_ids() {
        Ok(rows) => {
            for row in rows {
                let index = schema
                    .table_named(&row.table)
                    .and_then(|table| schema.table_mut(table).index_mut(&row.index));
                if let Some(index) = index {
                    index.id = Some(row.id);
                }
            }
        }
        Err(err) => warn!(code = %err.code(), error = %err, "index ids unavailable"),
    }

    match source.table_comments() {
        Ok(rows) => {
            for row in rows {
                if let Some(table) = schema.table_named(&row.table) {
                    schema
                        .table_mut(table)
                        .set_comments(row.comments.as_deref());
                }
            }
        }
        Err(err) => warn!(code = %err.code(), error = %err, "table comments unavailable"),
    }

    match source.column_comments() {
        Ok(rows) => {
            for row in rows {
                let column = row.column.as_deref().and_then(|name| {
                    schema
                        .table_named(&row.table)
                        .and_then(|table| schema.column_named(table, name))
                });
                if let Some(column) = column {
                    schema
                        .column_mut(column)
                        .set_comments(row.comments.as_deref());
                }
            }
        }
        Err(err) => warn!(code = %err.code(), error = %err, "column comments unavailable"),
    }
}
