use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::thread;

/// Analyzer settings, usually read from `relscope.toml`.
///
/// Every field has a default, so an empty file or a missing one both yield a
/// usable configuration.
#[allow(clippy::struct_excessive_bools)] // independent switches of a flat TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Maximum number of tables constructed concurrently. `1` loads
    /// sequentially on the caller.
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_true")]
    pub row_counts: bool,
    /// Resolve foreign keys that point into other schemas.
    #[serde(default)]
    pub multiple_schemas: bool,
    #[serde(default = "default_true")]
    pub views: bool,
    /// Skip tables whose names contain `$`.
    #[serde(default = "default_true")]
    pub skip_dollar_names: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            row_counts: default_true(),
            multiple_schemas: false,
            views: default_true(),
            skip_dollar_names: default_true(),
        }
    }
}

impl AnalyzerConfig {
    /// Worker count clamped to at least one.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.threads.max(1)
    }
}

/// Load an [`AnalyzerConfig`] from a TOML file.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<AnalyzerConfig> {
    if !path.exists() {
        return Ok(AnalyzerConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<AnalyzerConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn default_threads() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

const fn default_true() -> bool {
    true
}
