//! ADP Common Library
//!
//! Shared types and utilities for the AIS data pipeline workspace:
//!
//! - **Logging**: centralized tracing setup used by every stage binary
//! - **Types**: shared domain types (stage summaries, table references)

pub mod logging;
pub mod types;

// Re-export commonly used types
pub use types::{StageSummary, TableRef};
