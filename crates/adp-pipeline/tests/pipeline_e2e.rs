//! End-to-end tests for the staged file pipeline
//!
//! These tests exercise the stages in sequence against a mock archive server
//! and a temporary volumes root:
//! - download into the holding volume
//! - rate-limited release into time partitions
//! - streaming decompression into the landing root
//! - checkpointed load into an in-memory sink

use adp_common::TableRef;
use adp_pipeline::load::{AisRow, CsvLoadConnector, LoaderConfig, RecordSink};
use adp_pipeline::{acquire, decompress, drip, load, LocalVolume, PipelineConfig, VolumeLocator};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PARTITION: &str = "dt=2025-01-01/hr=00";

fn csv_payload(mmsi: &str) -> String {
    format!(
        "mmsi,base_date_time,latitude,longitude,sog,cog,vessel_name\n\
         {mmsi},2025-01-01T00:00:00,29.5,-90.1,12.3,180.0,EXAMPLE\n\
         {mmsi},2025-01-01T00:00:10,29.6,-90.2,,,EXAMPLE\n"
    )
}

struct Volumes {
    _tmp: TempDir,
    holding: VolumeLocator,
    staged: VolumeLocator,
    landing: VolumeLocator,
}

fn volumes() -> Volumes {
    let tmp = TempDir::new().unwrap();
    let cfg = PipelineConfig {
        catalog: "ais".to_string(),
        schema: "ais_assets".to_string(),
        volumes_root: tmp.path().to_path_buf(),
    };
    let holding = cfg.locator("full_history");
    let staged = cfg.locator("staged");
    let landing = cfg.locator("landing");
    for locator in [&holding, &staged, &landing] {
        std::fs::create_dir_all(locator.path()).unwrap();
    }
    Volumes {
        _tmp: tmp,
        holding,
        staged,
        landing,
    }
}

/// Serve an index page listing the given archives plus each archive body,
/// zstd-compressed from its CSV payload.
async fn mount_archive(server: &MockServer, files: &[(&str, &str)]) {
    let links: String = files
        .iter()
        .map(|(name, _)| format!(r#"<a href="{name}">{name}</a>"#))
        .collect();
    Mock::given(method("GET"))
        .and(path("/2025/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(links))
        .mount(server)
        .await;

    for (name, csv) in files {
        let body = zstd::encode_all(csv.as_bytes(), 0).unwrap();
        Mock::given(method("GET"))
            .and(path(format!("/2025/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }
}

#[derive(Default)]
struct CollectSink {
    rows: Mutex<Vec<AisRow>>,
    pending: Mutex<Vec<AisRow>>,
}

impl RecordSink for CollectSink {
    async fn ensure_table(&self, _table: &TableRef) -> adp_pipeline::Result<()> {
        Ok(())
    }

    async fn begin(&self) -> adp_pipeline::Result<()> {
        self.pending.lock().unwrap().clear();
        Ok(())
    }

    async fn append(&self, _table: &TableRef, rows: &[AisRow]) -> adp_pipeline::Result<u64> {
        self.pending.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn commit(&self) -> adp_pipeline::Result<()> {
        let mut pending = self.pending.lock().unwrap();
        self.rows.lock().unwrap().append(&mut pending);
        Ok(())
    }

    async fn rollback(&self) -> adp_pipeline::Result<()> {
        self.pending.lock().unwrap().clear();
        Ok(())
    }
}

// ============================================================================
// Full chain
// ============================================================================

#[tokio::test]
async fn test_download_release_decompress_load_chain() {
    let server = MockServer::start().await;
    let csv_a = csv_payload("367000001");
    let csv_b = csv_payload("367000002");
    mount_archive(
        &server,
        &[("a.csv.zst", csv_a.as_str()), ("b.csv.zst", csv_b.as_str())],
    )
    .await;

    let vols = volumes();
    let volume = LocalVolume::new();

    // Stage 1: download everything the archive lists.
    let summary = acquire::run(
        &volume,
        &vols.holding,
        &acquire::AcquireOptions {
            base_url: server.uri(),
            year: 2025,
            limit: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(summary.succeeded, 2);

    // Stage 2: release into a fixed partition for a deterministic layout.
    let summary = drip::run(
        &volume,
        &vols.holding,
        &vols.staged,
        &drip::DripOptions {
            n_per_run: 0,
            delete_source: true,
        },
        |_| PARTITION.to_string(),
    )
    .unwrap();
    assert_eq!(summary.succeeded, 2);
    assert!(vols.staged.join(PARTITION).join("a.csv.zst").exists());
    assert!(!vols.holding.join("a.csv.zst").exists());

    // Stage 3: decompress into the landing root.
    let summary = decompress::run(
        &volume,
        &vols.staged,
        &vols.landing,
        &decompress::DecompressOptions::default(),
    )
    .unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(
        std::fs::read_to_string(vols.landing.join("a.csv")).unwrap(),
        csv_a
    );
    assert_eq!(
        std::fs::read_to_string(vols.landing.join("b.csv")).unwrap(),
        csv_b
    );

    // Stage 4: load into the sink; two rows per file.
    let connector = CsvLoadConnector::new(&volume, CollectSink::default());
    let cfg = LoaderConfig {
        landing: vols.landing.clone(),
        schema_location: PathBuf::from("_schema"),
        checkpoint_location: PathBuf::from("_checkpoint"),
        table: TableRef::new("ais_assets", "ais_data"),
    };
    let summary = connector.run_until_caught_up(&cfg).await.unwrap();
    assert_eq!(summary.succeeded, 2);

    let rows = connector.sink().rows.lock().unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.event_ts.is_some()));
    drop(rows);

    // The whole chain is idempotent once caught up.
    assert!(connector.run_until_caught_up(&cfg).await.unwrap().is_noop());
    let summary = decompress::run(
        &volume,
        &vols.staged,
        &vols.landing,
        &decompress::DecompressOptions::default(),
    )
    .unwrap();
    assert!(summary.is_noop());
}

// ============================================================================
// Rate-limited backlog
// ============================================================================

#[tokio::test]
async fn test_backlog_drains_in_limited_batches() {
    let server = MockServer::start().await;
    let csvs: Vec<String> = (1..=3).map(|i| csv_payload(&format!("36700000{i}"))).collect();
    mount_archive(
        &server,
        &[
            ("a.csv.zst", csvs[0].as_str()),
            ("b.csv.zst", csvs[1].as_str()),
            ("c.csv.zst", csvs[2].as_str()),
        ],
    )
    .await;

    let vols = volumes();
    let volume = LocalVolume::new();

    acquire::run(
        &volume,
        &vols.holding,
        &acquire::AcquireOptions {
            base_url: server.uri(),
            year: 2025,
            limit: None,
        },
    )
    .await
    .unwrap();

    let drip_opts = drip::DripOptions {
        n_per_run: 2,
        delete_source: false,
    };

    // Round 1: a and b (ascending name order) are released and decompressed.
    let summary = drip::run(&volume, &vols.holding, &vols.staged, &drip_opts, |_| {
        PARTITION.to_string()
    })
    .unwrap();
    assert_eq!(summary.succeeded, 2);

    decompress::run(
        &volume,
        &vols.staged,
        &vols.landing,
        &decompress::DecompressOptions::default(),
    )
    .unwrap();
    assert!(vols.landing.join("a.csv").exists());
    assert!(vols.landing.join("b.csv").exists());
    assert!(!vols.landing.join("c.csv").exists());

    // Round 2: only the remaining file moves; nothing is re-released.
    let summary = drip::run(&volume, &vols.holding, &vols.staged, &drip_opts, |_| {
        PARTITION.to_string()
    })
    .unwrap();
    assert_eq!(summary.succeeded, 1);

    decompress::run(
        &volume,
        &vols.staged,
        &vols.landing,
        &decompress::DecompressOptions::default(),
    )
    .unwrap();
    assert_eq!(
        std::fs::read_to_string(vols.landing.join("c.csv")).unwrap(),
        csvs[2]
    );

    // Round 3: both stages report no work.
    let summary = drip::run(&volume, &vols.holding, &vols.staged, &drip_opts, |_| {
        PARTITION.to_string()
    })
    .unwrap();
    assert!(summary.is_noop());
}

// ============================================================================
// Loader sequencing
// ============================================================================

#[tokio::test]
async fn test_load_then_skip_enrich_reports_summary() {
    let vols = volumes();
    let volume = LocalVolume::new();
    std::fs::write(vols.landing.join("a.csv"), csv_payload("367000009")).unwrap();

    let connector = CsvLoadConnector::new(&volume, CollectSink::default());
    let cfg = LoaderConfig {
        landing: vols.landing.clone(),
        schema_location: PathBuf::from("_schema"),
        checkpoint_location: PathBuf::from("_checkpoint"),
        table: TableRef::new("ais_assets", "ais_data"),
    };

    let surface = NoopSurface;
    let summary = load::run(&connector, &surface, &cfg, true).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(connector.sink().rows.lock().unwrap().len(), 2);
}

struct NoopSurface;

impl adp_pipeline::sql::SqlSurface for NoopSurface {
    async fn execute(&self, _sql: &str) -> adp_pipeline::Result<u64> {
        Ok(0)
    }

    async fn column_exists(
        &self,
        _table: &TableRef,
        _column: &str,
    ) -> adp_pipeline::Result<bool> {
        Ok(false)
    }
}
