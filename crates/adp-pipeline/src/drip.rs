//! Atomic publisher ("dripper")
//!
//! Releases a rate-limited batch of held files into the landing area with a
//! stage-then-rename protocol: each file is copied to `_staging` (invisible
//! to partition scanners) and then renamed into a time-partitioned folder.
//! Copy is not atomic; rename within one volume is, so a streaming reader
//! polling the partitions never observes a half-copied object.

use crate::config::VolumeLocator;
use crate::error::Result;
use crate::inventory;
use crate::volume::{FileRecord, Volume};
use adp_common::StageSummary;
use chrono::{DateTime, Timelike, Utc};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Staging directory under the landing root. The leading underscore keeps it
/// out of recursive partition listings.
pub const STAGING_DIR: &str = "_staging";

/// Extensions eligible for release into the landing area.
pub const ELIGIBLE_EXTENSIONS: &[&str] = &[".csv.zst", ".zip", ".csv"];

/// Options for a single dripper run.
#[derive(Debug, Clone)]
pub struct DripOptions {
    /// Number of files to release per run (0 = all eligible)
    pub n_per_run: usize,

    /// Remove the holding-area original after a successful rename
    pub delete_source: bool,
}

/// Wall-clock partition segment, e.g. `dt=2025-08-30/hr=07`.
///
/// Purely operational organization of the landing area; it has no bearing on
/// correctness or read completeness.
pub fn hourly_partition(now: DateTime<Utc>) -> String {
    format!("dt={}/hr={:02}", now.format("%Y-%m-%d"), now.hour())
}

/// Release a batch of held files into the landing area.
pub fn run(
    volume: &dyn Volume,
    source: &VolumeLocator,
    landing: &VolumeLocator,
    opts: &DripOptions,
    partition_fn: impl Fn(DateTime<Utc>) -> String,
) -> Result<StageSummary> {
    let source_files: Vec<FileRecord> = volume
        .list(&source.path())?
        .into_iter()
        .filter(|f| ELIGIBLE_EXTENSIONS.iter().any(|ext| f.name.ends_with(ext)))
        .collect();

    let landing_files = match volume.list_recursive(&landing.path()) {
        Ok(files) => files,
        Err(e) => {
            warn!(volume = %landing, error = %e, "Landing listing failed, treating as empty");
            Vec::new()
        }
    };

    if inventory::is_caught_up(&source_files, &landing_files) {
        info!(source = %source, landing = %landing, "Landing already contains all source files");
        return Ok(StageSummary::new());
    }

    let limit = (opts.n_per_run > 0).then_some(opts.n_per_run);
    let candidates = inventory::diff(&source_files, &landing_files, limit);
    if candidates.is_empty() {
        info!(source = %source, "No files to release");
        return Ok(StageSummary::new());
    }

    let staging = landing.join(STAGING_DIR);
    volume.mkdirs(&staging)?;

    let mut summary = StageSummary::new();
    for file in &candidates {
        match publish_one(volume, file, landing, &staging, opts.delete_source, &partition_fn) {
            Ok(()) => {
                info!(file = %file.name, landing = %landing, "Released");
                summary.record_success();
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "Release failed, source left untouched");
                summary.record_failure();
            }
        }
    }

    Ok(summary)
}

/// Publish one file: copy to staging, rename into the current partition,
/// optionally delete the source. On failure the source is never removed and
/// the staged temp is cleaned up best-effort.
fn publish_one(
    volume: &dyn Volume,
    file: &FileRecord,
    landing: &VolumeLocator,
    staging: &Path,
    delete_source: bool,
    partition_fn: &impl Fn(DateTime<Utc>) -> String,
) -> Result<()> {
    let staged = staging.join(format!("{}.tmp", Uuid::new_v4().simple()));

    let published = (|| -> Result<()> {
        volume.copy(&file.path, &staged)?;
        let partition = landing.join(partition_fn(Utc::now()));
        volume.mkdirs(&partition)?;
        volume.rename(&staged, &partition.join(&file.name))?;
        Ok(())
    })();

    if let Err(e) = published {
        let _ = volume.remove(&staged);
        return Err(e);
    }

    if delete_source {
        if let Err(e) = volume.remove(&file.path) {
            // The copy is already visible downstream; the stale source will be
            // skipped by the next run's diff.
            warn!(file = %file.name, error = %e, "Failed to delete source after release");
        }
    }

    Ok(())
}
