//! Remote listing resolver
//!
//! Turns a year selector into the list of downloadable archive URLs by
//! scraping the remote HTML index page. This is the only component that
//! talks to the remote archive's listing format; a failure here is fatal for
//! the download stage since there is nothing to do without the index.

use crate::error::{PipelineError, Result};
use scraper::{Html, Selector};
use tracing::debug;

/// Default archive index for NOAA AIS data.
pub const DEFAULT_BASE_URL: &str = "https://coast.noaa.gov/htdata/CMSP/AISDataHandler";

/// File extensions the archive publishes.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".csv.zst"];

/// Fetch the list of archive file URLs for the given year.
pub async fn fetch_file_list(
    client: &reqwest::Client,
    base_url: &str,
    year: u16,
) -> Result<Vec<String>> {
    let url = format!("{base_url}/{year}/index.html");
    debug!(url = %url, "Fetching archive index");

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(PipelineError::remote_listing(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }

    let html = response.text().await?;
    Ok(parse_index(&html, base_url, year))
}

/// Extract archive URLs from the index page's anchor elements.
fn parse_index(html: &str, base_url: &str, year: u16) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a").expect("static selector");

    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| ARCHIVE_EXTENSIONS.iter().any(|ext| href.ends_with(ext)))
        .map(|href| format!("{base_url}/{year}/{href}"))
        .collect()
}

/// Final path segment of a URL, i.e. the archive file name.
pub fn filename_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INDEX_HTML: &str = r#"
        <html><body>
        <a href="ais-2025-01-01.csv.zst">ais-2025-01-01.csv.zst</a>
        <a href="ais-2025-01-02.csv.zst">ais-2025-01-02.csv.zst</a>
        <a href="AIS_2025_01_03.zip">AIS_2025_01_03.zip</a>
        <a href="readme.html">readme</a>
        <a>no href</a>
        </body></html>
    "#;

    #[test]
    fn test_parse_index_keeps_archive_links_only() {
        let urls = parse_index(INDEX_HTML, "https://example.com/ais", 2025);
        assert_eq!(
            urls,
            vec![
                "https://example.com/ais/2025/ais-2025-01-01.csv.zst",
                "https://example.com/ais/2025/ais-2025-01-02.csv.zst",
                "https://example.com/ais/2025/AIS_2025_01_03.zip",
            ]
        );
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/ais/2025/a.csv.zst"),
            "a.csv.zst"
        );
        assert_eq!(filename_from_url("bare-name.zip"), "bare-name.zip");
    }

    #[tokio::test]
    async fn test_fetch_file_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2025/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(INDEX_HTML))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let urls = fetch_file_list(&client, &server.uri(), 2025).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].starts_with(&server.uri()));
    }

    #[tokio::test]
    async fn test_fetch_file_list_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2025/index.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = fetch_file_list(&client, &server.uri(), 2025)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RemoteListing(_)));
    }
}
