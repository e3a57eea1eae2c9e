//! Managed volume abstraction
//!
//! Stages talk to volumes through the narrow [`Volume`] interface: list, read,
//! write, copy, rename, remove, mkdirs. [`LocalVolume`] is the concrete
//! implementation for volumes mounted as a local directory tree.
//!
//! Listings are always taken fresh at decision time; nothing here caches a
//! directory's contents across calls.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A file observed in a volume listing.
///
/// Identity is `name`; records are immutable snapshots and are superseded by
/// the next listing rather than mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Bare file name (no directory components)
    pub name: String,

    /// Full path of the file at listing time
    pub path: PathBuf,

    /// Size in bytes
    pub size: u64,

    /// Last-modified timestamp
    pub modified: DateTime<Utc>,
}

/// Narrow interface over a managed volume.
pub trait Volume {
    /// List the files directly under `dir` (no subdirectories).
    fn list(&self, dir: &Path) -> Result<Vec<FileRecord>>;

    /// List files under `dir` recursively, skipping internal directories
    /// (names starting with `_` or `.`, e.g. `_staging`, `_checkpoint`).
    fn list_recursive(&self, dir: &Path) -> Result<Vec<FileRecord>>;

    /// Open a file for streamed reading.
    fn reader(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Create (truncate) a file for streamed writing.
    fn writer(&self, path: &Path) -> Result<Box<dyn Write + Send>>;

    /// Copy a file, returning the number of bytes copied. Not atomic.
    fn copy(&self, src: &Path, dst: &Path) -> Result<u64>;

    /// Atomically move a file within the volume.
    fn rename(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Remove a file.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Create a directory and all parents.
    fn mkdirs(&self, path: &Path) -> Result<()>;

    /// List a destination directory, treating failure as "nothing exists yet".
    ///
    /// A missing or unreadable destination must not fail a run on first use;
    /// the differ then degrades to "process everything".
    fn list_or_empty(&self, dir: &Path) -> Vec<FileRecord> {
        match self.list(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Destination listing failed, treating as empty");
                Vec::new()
            }
        }
    }
}

/// Volume implementation over a locally mounted directory tree.
#[derive(Debug, Clone, Default)]
pub struct LocalVolume;

impl LocalVolume {
    pub fn new() -> Self {
        Self
    }

    fn record_for(path: PathBuf, metadata: &fs::Metadata) -> Option<FileRecord> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Some(FileRecord {
            name,
            path,
            size: metadata.len(),
            modified,
        })
    }

    fn walk(dir: &Path, out: &mut Vec<FileRecord>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let path = entry.path();
            if metadata.is_dir() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('_') || name.starts_with('.') {
                    continue;
                }
                Self::walk(&path, out)?;
            } else if let Some(record) = Self::record_for(path, &metadata) {
                out.push(record);
            }
        }
        Ok(())
    }
}

impl Volume for LocalVolume {
    fn list(&self, dir: &Path) -> Result<Vec<FileRecord>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                if let Some(record) = Self::record_for(entry.path(), &metadata) {
                    files.push(record);
                }
            }
        }
        Ok(files)
    }

    fn list_recursive(&self, dir: &Path) -> Result<Vec<FileRecord>> {
        let mut files = Vec::new();
        Self::walk(dir, &mut files)?;
        Ok(files)
    }

    fn reader(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn writer(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(fs::File::create(path)?))
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<u64> {
        Ok(fs::copy(src, dst)?)
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        Ok(fs::rename(src, dst)?)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        Ok(fs::remove_file(path)?)
    }

    fn mkdirs(&self, path: &Path) -> Result<()> {
        Ok(fs::create_dir_all(path)?)
    }
}
