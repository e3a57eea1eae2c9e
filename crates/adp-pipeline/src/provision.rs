//! Idempotent catalog/schema/volume provisioning
//!
//! Each stage runs these once before any file processing. A provisioning
//! failure is a setup error and aborts the run; per-file recovery never
//! applies here.

use crate::config::VolumeLocator;
use crate::error::{PipelineError, Result};
use crate::sql::SqlSurface;
use crate::volume::Volume;
use tracing::info;

/// Create a volume (and its catalog/schema directories) if absent.
pub fn ensure_volume(volume: &dyn Volume, locator: &VolumeLocator) -> Result<()> {
    volume
        .mkdirs(&locator.path())
        .map_err(|e| PipelineError::setup(format!("create volume {locator}: {e}")))?;
    info!(volume = %locator, "Volume ready");
    Ok(())
}

/// Create the table-side schema if absent.
pub async fn ensure_schema<S: SqlSurface>(surface: &S, schema: &str) -> Result<()> {
    surface
        .execute(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
        .await
        .map_err(|e| PipelineError::setup(format!("create schema {schema}: {e}")))?;
    info!(schema, "Schema ready");
    Ok(())
}
