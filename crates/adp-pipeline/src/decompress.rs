//! Streaming decompressor
//!
//! Decompresses landed archive files into the landing root using
//! bounded-memory chunked transfer. The format is resolved once per file into
//! a [`CompressionFormat`] and matched exhaustively; memory usage for the
//! Zstandard path is bounded by the decoded-block size regardless of input
//! size.

use crate::config::VolumeLocator;
use crate::drip::STAGING_DIR;
use crate::error::{PipelineError, Result};
use crate::inventory::{self, canonical_name};
use crate::volume::{FileRecord, Volume};
use adp_common::StageSummary;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Default decoded-block size for frame-streamed decoding (50 MiB).
///
/// A tunable, not a correctness parameter: any positive size yields the same
/// output, larger blocks just trade memory for fewer write calls.
pub const DEFAULT_BLOCK_SIZE: usize = 50 * 1024 * 1024;

/// Compression container of an archive file, resolved once from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Whole-file Zstandard frame (`.csv.zst`)
    ZstFrame,
    /// Zip container holding one or more CSV members (`.zip`)
    ZipArchive,
    /// Anything else; never a decompression candidate
    Unsupported,
}

impl CompressionFormat {
    pub fn detect(name: &str) -> Self {
        if name.ends_with(".csv.zst") {
            CompressionFormat::ZstFrame
        } else if name.ends_with(".zip") {
            CompressionFormat::ZipArchive
        } else {
            CompressionFormat::Unsupported
        }
    }
}

/// Options for a single decompression run.
#[derive(Debug, Clone)]
pub struct DecompressOptions {
    /// Maximum number of files to decompress this run (None = all)
    pub limit: Option<usize>,

    /// Remove the compressed original after the output is fully written
    pub delete_compressed: bool,

    /// Decoded-block size for frame streaming
    pub block_size: usize,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            limit: None,
            delete_compressed: false,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Decompress every landed compressed file that has no decompressed
/// counterpart yet.
///
/// Compressed inputs are discovered recursively (the dripper partitions the
/// landing area); outputs land flat in the landing root where the loader
/// reads them. Per-file failures are logged and counted, never escalated.
pub fn run(
    volume: &dyn Volume,
    source: &VolumeLocator,
    landing: &VolumeLocator,
    opts: &DecompressOptions,
) -> Result<StageSummary> {
    let compressed: Vec<FileRecord> = match volume.list_recursive(&source.path()) {
        Ok(files) => files
            .into_iter()
            .filter(|f| CompressionFormat::detect(&f.name) != CompressionFormat::Unsupported)
            .collect(),
        Err(e) => {
            warn!(volume = %source, error = %e, "Source listing failed, treating as empty");
            Vec::new()
        }
    };

    let decompressed: Vec<FileRecord> = volume
        .list_or_empty(&landing.path())
        .into_iter()
        .filter(|f| f.name.ends_with(".csv"))
        .collect();

    let candidates = inventory::diff(&compressed, &decompressed, opts.limit);
    if candidates.is_empty() {
        info!(source = %source, "No compressed files need decompression");
        return Ok(StageSummary::new());
    }

    let mut summary = StageSummary::new();
    for file in &candidates {
        match decompress_file(volume, file, landing, opts) {
            Ok(()) => summary.record_success(),
            Err(e) => {
                warn!(file = %file.name, error = %e, "Decompression failed, skipping");
                summary.record_failure();
            }
        }
    }

    Ok(summary)
}

/// Decompress a single file into the landing root.
pub fn decompress_file(
    volume: &dyn Volume,
    file: &FileRecord,
    landing: &VolumeLocator,
    opts: &DecompressOptions,
) -> Result<()> {
    match CompressionFormat::detect(&file.name) {
        CompressionFormat::ZstFrame => decompress_zst(volume, file, landing, opts),
        CompressionFormat::ZipArchive => decompress_zip(volume, file, landing, opts),
        CompressionFormat::Unsupported => {
            Err(PipelineError::UnsupportedFormat(file.name.clone()))
        }
    }
}

/// Frame-streamed Zstandard decoding with a fixed decoded-block buffer.
fn decompress_zst(
    volume: &dyn Volume,
    file: &FileRecord,
    landing: &VolumeLocator,
    opts: &DecompressOptions,
) -> Result<()> {
    let output_name = canonical_name(&file.name);

    let mut decoder = zstd::stream::read::Decoder::new(volume.reader(&file.path)?)?;
    stage_output(volume, landing, &output_name, |output| {
        let mut block = vec![0u8; opts.block_size];
        loop {
            let n = decoder.read(&mut block)?;
            if n == 0 {
                break;
            }
            output.write_all(&block[..n])?;
        }
        Ok(())
    })?;

    info!(file = %file.name, output = %output_name, "Decompressed");
    finish(volume, file, opts)
}

/// Extract every CSV member of a zip container into the landing root.
fn decompress_zip(
    volume: &dyn Volume,
    file: &FileRecord,
    landing: &VolumeLocator,
    opts: &DecompressOptions,
) -> Result<()> {
    // ZipArchive needs Seek, which the streamed volume reader does not offer;
    // volumes are mounted locally, so archives are opened directly.
    let input = std::fs::File::open(&file.path)?;
    let mut archive = zip::ZipArchive::new(input)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if !entry.name().ends_with(".csv") {
            continue;
        }
        let member = Path::new(entry.name())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PipelineError::UnsupportedFormat(entry.name().to_string()))?;

        stage_output(volume, landing, &member, |output| {
            std::io::copy(&mut entry, output)?;
            Ok(())
        })?;
        info!(member = %member, archive = %file.name, "Extracted");
    }

    finish(volume, file, opts)
}

/// Write an output file through a staged temp, renaming it into the landing
/// root only once fully written. A failed write removes the temp, so a
/// half-decompressed output is never visible to the loader and never
/// satisfies the differ's canonical-name check.
fn stage_output(
    volume: &dyn Volume,
    landing: &VolumeLocator,
    output_name: &str,
    write: impl FnOnce(&mut dyn Write) -> Result<()>,
) -> Result<()> {
    let staging = landing.join(STAGING_DIR);
    volume.mkdirs(&staging)?;
    let staged = staging.join(format!("{}.tmp", Uuid::new_v4().simple()));

    let result = (|| -> Result<()> {
        let mut output = volume.writer(&staged)?;
        write(output.as_mut())?;
        output.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = volume.remove(&staged);
        return Err(e);
    }

    volume.rename(&staged, &landing.join(output_name))
}

/// Post-success cleanup: remove the compressed original only after the output
/// is fully written and closed.
fn finish(volume: &dyn Volume, file: &FileRecord, opts: &DecompressOptions) -> Result<()> {
    if opts.delete_compressed {
        volume.remove(&file.path)?;
        info!(file = %file.name, "Deleted compressed file");
    }
    Ok(())
}
