//! Progress bar utilities for transfers
//!
//! Progress reporting is cosmetic: it must never fail a transfer, so bar
//! construction falls back to a hidden bar if the template is rejected.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a byte-progress bar for a file transfer.
///
/// `total` of zero (unknown content length) yields a plain byte counter.
pub fn download_bar(total: u64, file_name: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg} {spinner:.green} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .map(|s| s.progress_chars("#>-"));
    match style {
        Ok(style) => pb.set_style(style),
        Err(_) => return ProgressBar::hidden(),
    }
    pb.set_message(file_name.to_string());
    pb
}

/// Format bytes into a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(52_428_800), "50.00 MB");
    }

    #[test]
    fn test_download_bar_length() {
        let pb = download_bar(1024, "a.csv.zst");
        assert_eq!(pb.length(), Some(1024));
    }
}
