use std::fmt;

/// Machine-readable error codes for the loading and linking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    TableEnumerationFailed,
    PrimedTableFailed,
    ColumnFetchFailed,
    PrimaryKeyFetchFailed,
    ForeignKeyFetchFailed,
    SupplementaryFetchFailed,
    UnsupportedQuery,
    WorkerSpawnFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::TableEnumerationFailed => "E2001",
            Self::PrimedTableFailed => "E2002",
            Self::ColumnFetchFailed => "E3001",
            Self::PrimaryKeyFetchFailed => "E3002",
            Self::ForeignKeyFetchFailed => "E3003",
            Self::SupplementaryFetchFailed => "E3004",
            Self::UnsupportedQuery => "E4001",
            Self::WorkerSpawnFailed => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::TableEnumerationFailed => "Could not enumerate tables",
            Self::PrimedTableFailed => "First table could not be loaded",
            Self::ColumnFetchFailed => "Column metadata unavailable",
            Self::PrimaryKeyFetchFailed => "Primary key metadata unavailable",
            Self::ForeignKeyFetchFailed => "Foreign key metadata unavailable",
            Self::SupplementaryFetchFailed => "Optional table metadata unavailable",
            Self::UnsupportedQuery => "Metadata query not supported by source",
            Self::WorkerSpawnFailed => "Loader worker could not be started",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::TableEnumerationFailed | Self::PrimedTableFailed => {
                Some("Check that the metadata source is reachable and the schema exists.")
            }
            Self::ColumnFetchFailed | Self::PrimaryKeyFetchFailed => {
                Some("Verify that the account can read the table's catalog entries.")
            }
            Self::ForeignKeyFetchFailed => {
                Some("Relationships for this table are incomplete; check catalog permissions.")
            }
            Self::SupplementaryFetchFailed => {
                Some("Defaults were used; grant catalog access to fill in this metadata.")
            }
            Self::UnsupportedQuery => None,
            Self::WorkerSpawnFailed => Some("Lower the thread count and retry."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A failure reported by a [`crate::source::MetadataSource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The underlying catalog query failed.
    #[error("{what} query failed: {message}")]
    Query { what: &'static str, message: String },
    /// The source does not implement this query.
    #[error("{what} query is not supported by this source")]
    Unsupported { what: &'static str },
}

impl SourceError {
    /// Convenience constructor for a failed query.
    #[must_use]
    pub fn query(what: &'static str, message: impl Into<String>) -> Self {
        Self::Query {
            what,
            message: message.into(),
        }
    }

    /// Required fetches have their own codes; any optional metadata query
    /// maps to [`ErrorCode::SupplementaryFetchFailed`].
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Query { what, .. } => match *what {
                "columns" => ErrorCode::ColumnFetchFailed,
                "primary keys" => ErrorCode::PrimaryKeyFetchFailed,
                "imported keys" | "exported keys" => ErrorCode::ForeignKeyFetchFailed,
                "tables" => ErrorCode::TableEnumerationFailed,
                _ => ErrorCode::SupplementaryFetchFailed,
            },
            Self::Unsupported { .. } => ErrorCode::UnsupportedQuery,
        }
    }
}

/// A table that could not be constructed or linked.
///
/// Recorded in the [`crate::loader::LoadReport`]; never aborts sibling tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} '{}': {error}", qualified(.schema.as_deref(), .table))]
pub struct TableFailure {
    pub schema: Option<String>,
    pub table: String,
    /// `"table"`, `"view"` or `"remote table"`.
    pub kind: &'static str,
    pub error: SourceError,
}

/// Caller-visible hard failures of [`crate::loader::load_schema`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to enumerate tables: {0}")]
    TableEnumeration(#[source] SourceError),
    #[error("failed to load first table '{table}': {source}")]
    PrimedTable {
        table: String,
        #[source]
        source: SourceError,
    },
    #[error("failed to start loader worker: {0}")]
    ThreadPool(#[source] std::io::Error),
}

impl LoadError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TableEnumeration(_) => ErrorCode::TableEnumerationFailed,
            Self::PrimedTable { .. } => ErrorCode::PrimedTableFailed,
            Self::ThreadPool(_) => ErrorCode::WorkerSpawnFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub(crate) fn qualified(schema: Option<&str>, table: &str) -> String {
    schema.map_or_else(|| table.to_string(), |schema| format!("{schema}.{table}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::TableEnumerationFailed,
            ErrorCode::PrimedTableFailed,
            ErrorCode::ColumnFetchFailed,
            ErrorCode::PrimaryKeyFetchFailed,
            ErrorCode::ForeignKeyFetchFailed,
            ErrorCode::SupplementaryFetchFailed,
            ErrorCode::UnsupportedQuery,
            ErrorCode::WorkerSpawnFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ColumnFetchFailed.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn source_errors_map_to_fetch_codes() {
        assert_eq!(
            SourceError::query("columns", "boom").code(),
            ErrorCode::ColumnFetchFailed
        );
        assert_eq!(
            SourceError::query("imported keys", "boom").code(),
            ErrorCode::ForeignKeyFetchFailed
        );
        assert_eq!(
            SourceError::Unsupported { what: "row count" }.code(),
            ErrorCode::UnsupportedQuery
        );
    }

    #[test]
    fn only_enumeration_failures_blame_reachability() {
        assert_eq!(
            SourceError::query("tables", "boom").code(),
            ErrorCode::TableEnumerationFailed
        );
        for what in [
            "indexes",
            "row count",
            "check constraints",
            "table ids",
            "column comments",
        ] {
            let code = SourceError::query(what, "boom").code();
            assert_eq!(code, ErrorCode::SupplementaryFetchFailed, "{what}");
            assert!(!code.hint().unwrap_or_default().contains("reachable"));
        }
    }

    #[test]
    fn table_failure_names_the_table() {
        let failure = TableFailure {
            schema: Some("app".to_string()),
            table: "orders".to_string(),
            kind: "table",
            error: SourceError::query("columns", "connection reset"),
        };
        assert_eq!(
            failure.to_string(),
            "table 'app.orders': columns query failed: connection reset"
        );
    }
}
