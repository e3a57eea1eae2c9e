//! Acquirer stage
//!
//! Streams each missing remote archive file into the holding volume. One
//! download per candidate with independent failures: a bad URL or a disk
//! error skips that file and the batch continues.

use crate::config::VolumeLocator;
use crate::error::{PipelineError, Result};
use crate::progress;
use crate::remote::{self, filename_from_url};
use crate::volume::Volume;
use adp_common::StageSummary;
use futures::StreamExt;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Options for a single acquisition run.
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    /// Archive base URL (year and file name are appended)
    pub base_url: String,

    /// Calendar year to acquire
    pub year: u16,

    /// Maximum number of files to download this run (None = all)
    pub limit: Option<usize>,
}

/// Download all remote files for the configured year that are not yet in the
/// holding volume.
pub async fn run(
    volume: &dyn Volume,
    holding: &VolumeLocator,
    opts: &AcquireOptions,
) -> Result<StageSummary> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    info!(year = opts.year, "Fetching archive file list");
    let urls = remote::fetch_file_list(&client, &opts.base_url, opts.year).await?;
    info!(count = urls.len(), "Files on remote");

    let existing: HashSet<String> = volume
        .list_or_empty(&holding.path())
        .into_iter()
        .map(|f| f.name)
        .collect();
    info!(count = existing.len(), volume = %holding, "Files already in holding volume");

    let mut candidates: Vec<&String> = urls
        .iter()
        .filter(|url| !existing.contains(filename_from_url(url)))
        .collect();
    candidates.sort_by_key(|url| filename_from_url(url));
    if let Some(limit) = opts.limit.filter(|n| *n > 0) {
        candidates.truncate(limit);
    }
    info!(count = candidates.len(), "Files to download");

    let mut summary = StageSummary::new();
    for url in candidates {
        let name = filename_from_url(url);
        let dest = holding.join(name);
        match download_file(&client, volume, url, &dest).await {
            Ok(bytes) => {
                info!(file = name, size = %progress::format_bytes(bytes), "Downloaded");
                summary.record_success();
            }
            Err(e) => {
                warn!(file = name, error = %e, "Download failed, skipping");
                summary.record_failure();
            }
        }
    }

    Ok(summary)
}

/// Stream one remote file to `dest`, reporting byte progress.
///
/// The response body is written chunk by chunk; the whole payload is never
/// buffered in memory.
pub async fn download_file(
    client: &reqwest::Client,
    volume: &dyn Volume,
    url: &str,
    dest: &Path,
) -> Result<u64> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(PipelineError::remote_listing(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }

    let total = response.content_length().unwrap_or(0);
    let pb = progress::download_bar(
        total,
        dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
            .as_str(),
    );

    let result = async {
        let mut file = volume.writer(dest)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush()?;
        Ok::<u64, PipelineError>(downloaded)
    }
    .await;

    match result {
        Ok(bytes) => {
            pb.finish_and_clear();
            Ok(bytes)
        }
        Err(e) => {
            pb.finish_and_clear();
            // A partial object would mask this file from the next run's diff.
            let _ = volume.remove(dest);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::volume::LocalVolume;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn holding_locator(root: &Path) -> VolumeLocator {
        let cfg = PipelineConfig {
            catalog: "ais".to_string(),
            schema: "ais_assets".to_string(),
            volumes_root: root.to_path_buf(),
        };
        let locator = cfg.locator("full_history");
        std::fs::create_dir_all(locator.path()).unwrap();
        locator
    }

    async fn mount_index(server: &MockServer, body: &str) {
        Mock::given(method("GET"))
            .and(path("/2025/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_run_downloads_missing_files() {
        let server = MockServer::start().await;
        mount_index(
            &server,
            r#"<a href="a.csv.zst">a</a><a href="b.csv.zst">b</a>"#,
        )
        .await;
        for name in ["a.csv.zst", "b.csv.zst"] {
            Mock::given(method("GET"))
                .and(path(format!("/2025/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
                .mount(&server)
                .await;
        }

        let tmp = TempDir::new().unwrap();
        let holding = holding_locator(tmp.path());
        let volume = LocalVolume::new();
        let opts = AcquireOptions {
            base_url: server.uri(),
            year: 2025,
            limit: None,
        };

        let summary = run(&volume, &holding, &opts).await.unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            std::fs::read(holding.join("a.csv.zst")).unwrap(),
            b"payload"
        );

        // Second run: everything already held, zero work.
        let summary = run(&volume, &holding, &opts).await.unwrap();
        assert!(summary.is_noop());
    }

    #[tokio::test]
    async fn test_one_bad_url_does_not_abort_batch() {
        let server = MockServer::start().await;
        mount_index(
            &server,
            r#"<a href="bad.csv.zst">bad</a><a href="good.csv.zst">good</a>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/2025/bad.csv.zst"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/2025/good.csv.zst"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let holding = holding_locator(tmp.path());
        let volume = LocalVolume::new();
        let opts = AcquireOptions {
            base_url: server.uri(),
            year: 2025,
            limit: None,
        };

        let summary = run(&volume, &holding, &opts).await.unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        // The failed file left nothing behind, so the next run retries it.
        assert!(!holding.join("bad.csv.zst").exists());
        assert!(holding.join("good.csv.zst").exists());
    }

    #[tokio::test]
    async fn test_limit_bounds_a_run() {
        let server = MockServer::start().await;
        mount_index(
            &server,
            r#"<a href="a.csv.zst">a</a><a href="b.csv.zst">b</a><a href="c.csv.zst">c</a>"#,
        )
        .await;
        for name in ["a.csv.zst", "b.csv.zst", "c.csv.zst"] {
            Mock::given(method("GET"))
                .and(path(format!("/2025/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
                .mount(&server)
                .await;
        }

        let tmp = TempDir::new().unwrap();
        let holding = holding_locator(tmp.path());
        let volume = LocalVolume::new();
        let opts = AcquireOptions {
            base_url: server.uri(),
            year: 2025,
            limit: Some(2),
        };

        let summary = run(&volume, &holding, &opts).await.unwrap();
        assert_eq!(summary.succeeded, 2);
        // Names are processed in ascending order, so a and b land first.
        assert!(holding.join("a.csv.zst").exists());
        assert!(holding.join("b.csv.zst").exists());
        assert!(!holding.join("c.csv.zst").exists());
    }

    #[tokio::test]
    async fn test_download_file_cleans_partial_on_disk_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.csv.zst"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;

        let volume = LocalVolume::new();
        let client = reqwest::Client::new();
        // Destination directory does not exist: the writer fails.
        let dest = PathBuf::from("/nonexistent-adp-test/file.csv.zst");
        let url = format!("{}/file.csv.zst", server.uri());

        assert!(download_file(&client, &volume, &url, &dest).await.is_err());
    }
}
