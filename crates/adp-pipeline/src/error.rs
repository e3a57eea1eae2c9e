//! Error types for the pipeline stages
//!
//! Setup failures abort a run before any file is touched; everything that can
//! go wrong for an individual file is caught at the per-file loop, logged,
//! and counted instead of escalating.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Comprehensive error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File system operation failed
    #[error("File operation failed: {0}. Check volume mount, permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}. Check your internet connection and the archive URL.")]
    Http(#[from] reqwest::Error),

    /// Database operation failed (SQLx)
    #[error("Database error: {0}. Check your database connection settings.")]
    Database(#[from] sqlx::Error),

    /// Zip archive could not be read
    #[error("Zip archive error: {0}. The file may be truncated or corrupted.")]
    Zip(#[from] zip::result::ZipError),

    /// CSV record could not be parsed
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing failed (checkpoint state)
    #[error("Failed to parse JSON: {0}. The checkpoint file may be corrupted; delete it to re-ingest from scratch.")]
    JsonParse(#[from] serde_json::Error),

    /// Remote archive index could not be listed
    #[error("Remote listing failed: {0}. Nothing to do without the archive index.")]
    RemoteListing(String),

    /// Catalog/schema/volume provisioning failed
    #[error("Setup failed: {0}. Fix provisioning before re-running the stage.")]
    Setup(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your arguments or ADP_* environment variables.")]
    Config(String),

    /// File has an extension no decompressor handles
    #[error("Unsupported compression format: '{0}'. Expected .csv.zst or .zip.")]
    UnsupportedFormat(String),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Create a remote listing error
    pub fn remote_listing(msg: impl Into<String>) -> Self {
        Self::RemoteListing(msg.into())
    }

    /// Create a setup error
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
