//! ADP Pipeline Library
//!
//! Staged file-lifecycle pipeline moving compressed AIS archive files from a
//! remote index into a continuously growing analytic table:
//!
//! - **Acquirer** (`acquire`): stream missing remote files into a holding volume
//! - **Atomic publisher** (`drip`): release rate-limited batches into the
//!   landing area via stage-then-rename
//! - **Streaming decompressor** (`decompress`): bounded-memory Zstandard/zip
//!   decompression into the landing root
//! - **Incremental loader** (`load`, `sink`): checkpointed CSV ingestion into
//!   the target table
//! - **Post-processor** (`enrich`): idempotent schema evolution and null-only
//!   backfill of derived spatial columns
//!
//! Every stage recomputes its candidate set from fresh listings via the
//! inventory differ (`inventory`); no pipeline state is persisted between
//! runs apart from the load connector's own checkpoint.

pub mod acquire;
pub mod config;
pub mod decompress;
pub mod drip;
pub mod enrich;
pub mod error;
pub mod inventory;
pub mod load;
pub mod progress;
pub mod provision;
pub mod remote;
pub mod sink;
pub mod sql;
pub mod volume;

// Re-export commonly used types
pub use config::{PipelineConfig, VolumeLocator};
pub use error::{PipelineError, Result};
pub use volume::{FileRecord, LocalVolume, Volume};
