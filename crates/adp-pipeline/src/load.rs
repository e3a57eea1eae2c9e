//! Incremental loader
//!
//! Consumes newly landed CSV files through a checkpointed streaming-read
//! connector and appends them to the target table, applying the single
//! transform of parsing the textual timestamp column. The connector's
//! checkpoint guarantees each landed file is read at most once across
//! restarts; this stage's contract is to run the append to completion before
//! the post-processor touches the table.

use crate::config::VolumeLocator;
use crate::error::Result;
use crate::volume::Volume;
use adp_common::{StageSummary, TableRef};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Timestamp layout of the archive's `base_date_time` column.
const BASE_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Rows per INSERT statement.
const APPEND_CHUNK_SIZE: usize = 1000;

/// Loader configuration: where to read, where the connector keeps its state,
/// and where to append.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Landing volume holding decompressed CSV files
    pub landing: VolumeLocator,

    /// Relative path within the landing volume for the inferred schema
    pub schema_location: PathBuf,

    /// Relative path within the landing volume for the resume checkpoint
    pub checkpoint_location: PathBuf,

    /// Target table to append to
    pub table: TableRef,
}

/// One raw AIS position report as it appears in the landed CSV files.
///
/// Header aliases cover both the archive's original capitalization and the
/// lowercased form some yearly drops use.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AisRecord {
    #[serde(alias = "MMSI")]
    pub mmsi: String,

    #[serde(alias = "BaseDateTime")]
    pub base_date_time: String,

    #[serde(alias = "LAT")]
    pub latitude: Option<f64>,

    #[serde(alias = "LON")]
    pub longitude: Option<f64>,

    #[serde(alias = "SOG")]
    pub sog: Option<f64>,

    #[serde(alias = "COG")]
    pub cog: Option<f64>,

    #[serde(alias = "VesselName")]
    pub vessel_name: Option<String>,
}

/// A record after the load transform: the textual timestamp parsed into a
/// typed one (null when unparsable, matching the engine's `to_timestamp`).
#[derive(Debug, Clone, PartialEq)]
pub struct AisRow {
    pub mmsi: String,
    pub base_date_time: String,
    pub event_ts: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub vessel_name: Option<String>,
}

impl From<AisRecord> for AisRow {
    fn from(record: AisRecord) -> Self {
        let event_ts =
            NaiveDateTime::parse_from_str(&record.base_date_time, BASE_DATE_TIME_FORMAT).ok();
        Self {
            mmsi: record.mmsi,
            base_date_time: record.base_date_time,
            event_ts,
            latitude: record.latitude,
            longitude: record.longitude,
            sog: record.sog,
            cog: record.cog,
            vessel_name: record.vessel_name,
        }
    }
}

/// Append-write target for loaded rows.
///
/// Appends are framed by a per-file write transaction: rows become visible
/// only at `commit`, and `rollback` discards every chunk appended since
/// `begin`. A file that fails mid-append therefore leaves no rows behind and
/// can be retried whole without duplicating anything.
pub trait RecordSink {
    /// Create the target schema/table if absent.
    fn ensure_table(
        &self,
        table: &TableRef,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Open the write transaction for one file.
    fn begin(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Append rows inside the open transaction, returning the number written.
    fn append(
        &self,
        table: &TableRef,
        rows: &[AisRow],
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Commit the open transaction, making the file's rows visible.
    fn commit(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Discard the open transaction and everything appended within it.
    fn rollback(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// The connector's resume checkpoint: which landed files have already been
/// appended. Opaque to the rest of the pipeline, which only configures its
/// location.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Checkpoint {
    consumed: BTreeSet<String>,
}

impl Checkpoint {
    fn load(volume: &dyn Volume, dir: &Path) -> Self {
        let path = dir.join("consumed.json");
        let Ok(mut reader) = volume.reader(&path) else {
            return Self::default();
        };
        let mut raw = String::new();
        if std::io::Read::read_to_string(&mut reader, &mut raw).is_err() {
            return Self::default();
        }
        serde_json::from_str(&raw).unwrap_or_default()
    }

    /// Persist via write-then-rename so a crash never leaves a torn
    /// checkpoint behind.
    fn save(&self, volume: &dyn Volume, dir: &Path) -> Result<()> {
        volume.mkdirs(dir)?;
        let staged = dir.join("consumed.json.tmp");
        let mut writer = volume.writer(&staged)?;
        writer.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        writer.flush()?;
        drop(writer);
        volume.rename(&staged, &dir.join("consumed.json"))
    }
}

/// Checkpointed CSV-to-table load connector.
///
/// "Run until caught up" semantics: process everything currently available in
/// the landing root, then stop.
pub struct CsvLoadConnector<'a, K: RecordSink> {
    volume: &'a dyn Volume,
    sink: K,
}

impl<'a, K: RecordSink> CsvLoadConnector<'a, K> {
    pub fn new(volume: &'a dyn Volume, sink: K) -> Self {
        Self { volume, sink }
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Read every new landed file, append it, and checkpoint it. Per-file
    /// failures are counted and retried on the next run because the file is
    /// only checkpointed after a successful append.
    pub async fn run_until_caught_up(&self, cfg: &LoaderConfig) -> Result<StageSummary> {
        let checkpoint_dir = cfg.landing.join(&cfg.checkpoint_location);
        let schema_dir = cfg.landing.join(&cfg.schema_location);

        let mut checkpoint = Checkpoint::load(self.volume, &checkpoint_dir);

        let mut candidates: Vec<_> = self
            .volume
            .list_or_empty(&cfg.landing.path())
            .into_iter()
            .filter(|f| f.name.ends_with(".csv") && !checkpoint.consumed.contains(&f.name))
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));

        if candidates.is_empty() {
            info!(landing = %cfg.landing, "No new files to load");
            return Ok(StageSummary::new());
        }

        self.sink.ensure_table(&cfg.table).await?;

        let mut summary = StageSummary::new();
        for file in &candidates {
            match self.load_file(cfg, &file.path, &schema_dir).await {
                Ok(rows) => {
                    info!(file = %file.name, rows, table = %cfg.table, "Appended");
                    checkpoint.consumed.insert(file.name.clone());
                    checkpoint.save(self.volume, &checkpoint_dir)?;
                    summary.record_success();
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Load failed, will retry next run");
                    summary.record_failure();
                }
            }
        }

        Ok(summary)
    }

    /// Read one file and append it inside a single sink transaction, so a
    /// mid-file failure leaves no rows behind and the whole file is retried.
    async fn load_file(
        &self,
        cfg: &LoaderConfig,
        path: &Path,
        schema_dir: &Path,
    ) -> Result<u64> {
        let reader = self.volume.reader(path)?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        self.persist_schema_once(&mut csv_reader, schema_dir)?;

        self.sink.begin().await?;
        match self.append_file(cfg, &mut csv_reader, path).await {
            Ok(total) => {
                self.sink.commit().await?;
                Ok(total)
            }
            Err(e) => {
                if let Err(rollback_err) = self.sink.rollback().await {
                    warn!(file = %path.display(), error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn append_file<R: std::io::Read>(
        &self,
        cfg: &LoaderConfig,
        csv_reader: &mut csv::Reader<R>,
        path: &Path,
    ) -> Result<u64> {
        let mut total = 0u64;
        let mut chunk: Vec<AisRow> = Vec::with_capacity(APPEND_CHUNK_SIZE);
        for result in csv_reader.deserialize::<AisRecord>() {
            match result {
                Ok(record) => chunk.push(record.into()),
                Err(e) => {
                    // One malformed row never blocks the rest of the file.
                    warn!(file = %path.display(), error = %e, "Skipping malformed record");
                    continue;
                }
            }
            if chunk.len() >= APPEND_CHUNK_SIZE {
                total += self.sink.append(&cfg.table, &chunk).await?;
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            total += self.sink.append(&cfg.table, &chunk).await?;
        }

        Ok(total)
    }

    /// Persist the inferred schema (header row) the first time any file is
    /// read; later files reuse it unchanged.
    fn persist_schema_once<R: std::io::Read>(
        &self,
        csv_reader: &mut csv::Reader<R>,
        schema_dir: &Path,
    ) -> Result<()> {
        let schema_path = schema_dir.join("schema.json");
        if self.volume.reader(&schema_path).is_ok() {
            return Ok(());
        }

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        self.volume.mkdirs(schema_dir)?;
        let mut writer = self.volume.writer(&schema_path)?;
        writer.write_all(serde_json::to_string_pretty(&headers)?.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Load everything currently available, then enrich.
///
/// The ordering is a hard sequencing requirement: enriching while an append
/// is still in flight would backfill an incomplete row set.
pub async fn run<K: RecordSink, S: crate::sql::SqlSurface>(
    connector: &CsvLoadConnector<'_, K>,
    surface: &S,
    cfg: &LoaderConfig,
    skip_enrich: bool,
) -> Result<StageSummary> {
    let summary = connector.run_until_caught_up(cfg).await?;

    if skip_enrich {
        info!("Skipping enrichment phase");
    } else {
        crate::enrich::run(surface, &cfg.table).await?;
    }

    Ok(summary)
}
