//! Common types used across the pipeline stages

use serde::{Deserialize, Serialize};

/// Per-run outcome counts for a pipeline stage.
///
/// Every stage finishes by printing one of these; individual file failures
/// are counted here instead of changing the process exit code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    /// Number of files the stage attempted to process
    pub attempted: usize,

    /// Number of files processed successfully
    pub succeeded: usize,

    /// Number of files that failed and were skipped
    pub failed: usize,
}

impl StageSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful file.
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    /// Record one failed file.
    pub fn record_failure(&mut self) {
        self.attempted += 1;
        self.failed += 1;
    }

    /// True when the run did no work at all.
    pub fn is_noop(&self) -> bool {
        self.attempted == 0
    }
}

impl std::fmt::Display for StageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "attempted: {}, succeeded: {}, failed: {}",
            self.attempted, self.succeeded, self.failed
        )
    }
}

/// A schema-qualified table reference.
///
/// Parsed once from user input so that SQL statements are built from a
/// validated value instead of ad-hoc string concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema (namespace) the table lives in
    pub schema: String,

    /// Bare table name
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse a `schema.table` identifier.
    pub fn parse(ident: &str) -> anyhow::Result<Self> {
        let mut parts = ident.split('.').filter(|p| !p.is_empty());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(schema), Some(name), None) => Ok(Self::new(schema, name)),
            _ => anyhow::bail!(
                "Invalid table identifier '{}': expected 'schema.table'",
                ident
            ),
        }
    }

    /// Fully qualified `schema.table` form used in SQL statements.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified())
    }
}
