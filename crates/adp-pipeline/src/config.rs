//! Pipeline configuration
//!
//! Catalog/schema/volume names are threaded through every stage as an explicit
//! value, never as ambient globals. `VolumeLocator` is the single place a
//! volume name turns into a concrete path.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default mount point for managed volumes.
pub const DEFAULT_VOLUMES_ROOT: &str = "/Volumes";

/// Per-run pipeline configuration shared by all stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Catalog name (top-level namespace)
    pub catalog: String,

    /// Schema name within the catalog
    pub schema: String,

    /// Directory the managed volumes are mounted under
    pub volumes_root: PathBuf,
}

impl PipelineConfig {
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> Result<Self> {
        let catalog = catalog.into();
        let schema = schema.into();
        if catalog.is_empty() || schema.is_empty() {
            return Err(PipelineError::config(
                "catalog and schema must both be non-empty",
            ));
        }

        let volumes_root = std::env::var("ADP_VOLUMES_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_VOLUMES_ROOT));

        Ok(Self {
            catalog,
            schema,
            volumes_root,
        })
    }

    /// Locate a named volume within this catalog/schema.
    pub fn locator(&self, volume: impl Into<String>) -> VolumeLocator {
        VolumeLocator {
            root: self.volumes_root.clone(),
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            volume: volume.into(),
        }
    }
}

/// A located managed volume: root mount plus catalog/schema/volume segments.
///
/// All path construction for volumes goes through [`VolumeLocator::path`] so
/// the layout convention lives in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeLocator {
    pub root: PathBuf,
    pub catalog: String,
    pub schema: String,
    pub volume: String,
}

impl VolumeLocator {
    /// Canonical filesystem path of the volume root.
    pub fn path(&self) -> PathBuf {
        self.root
            .join(&self.catalog)
            .join(&self.schema)
            .join(&self.volume)
    }

    /// Path of an entry inside the volume.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.path().join(relative)
    }

    /// Dotted `catalog.schema.volume` identifier for logs and summaries.
    pub fn identifier(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.volume)
    }
}

impl std::fmt::Display for VolumeLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
