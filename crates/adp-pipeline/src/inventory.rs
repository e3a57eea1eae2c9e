//! Inventory differ
//!
//! Pure functions deciding which files still need action at a stage boundary.
//! Identity is the canonical name: a compressed file and its decompressed
//! counterpart are the same logical file. No I/O happens here; callers pass
//! in listings taken at decision time.

use crate::volume::FileRecord;
use std::collections::HashSet;

/// Canonical name of a file after stripping known compression suffixes.
///
/// `foo.csv.zst` and `foo.csv` are the same logical file. Zip archives are
/// matched by the naive member-name rule (`foo.zip` -> `foo.csv`), which is
/// only a dedup heuristic: zip member names are not guaranteed to follow it.
pub fn canonical_name(name: &str) -> String {
    if let Some(stem) = name.strip_suffix(".zst") {
        return stem.to_string();
    }
    if let Some(stem) = name.strip_suffix(".zip") {
        return format!("{stem}.csv");
    }
    name.to_string()
}

/// Source files whose canonical name is absent from the destination listing,
/// sorted ascending by name for deterministic processing order, optionally
/// truncated to `limit`.
///
/// An empty destination listing means "nothing exists yet": every source file
/// is a candidate.
pub fn diff(
    source: &[FileRecord],
    destination: &[FileRecord],
    limit: Option<usize>,
) -> Vec<FileRecord> {
    let existing: HashSet<String> = destination
        .iter()
        .map(|f| canonical_name(&f.name))
        .collect();

    let mut candidates: Vec<FileRecord> = source
        .iter()
        .filter(|f| !existing.contains(&canonical_name(&f.name)))
        .cloned()
        .collect();

    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    match limit {
        Some(n) if n > 0 => candidates.truncate(n),
        _ => {}
    }

    candidates
}

/// True when a non-empty source listing is fully present downstream.
///
/// Used by the publisher's pre-flight short-circuit so scheduled reruns are
/// cheap no-ops once caught up.
pub fn is_caught_up(source: &[FileRecord], destination: &[FileRecord]) -> bool {
    if source.is_empty() {
        return false;
    }
    let existing: HashSet<String> = destination
        .iter()
        .map(|f| canonical_name(&f.name))
        .collect();
    source
        .iter()
        .all(|f| existing.contains(&canonical_name(&f.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(name: &str) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            path: PathBuf::from(format!("/vol/{name}")),
            size: 1,
            modified: Utc::now(),
        }
    }

    #[test]
    fn test_canonical_name_strips_zst() {
        assert_eq!(canonical_name("ais-2025-01-01.csv.zst"), "ais-2025-01-01.csv");
        assert_eq!(canonical_name("ais-2025-01-01.csv"), "ais-2025-01-01.csv");
    }

    #[test]
    fn test_canonical_name_zip_heuristic() {
        // Dedup heuristic only; zip member names may differ in reality.
        assert_eq!(canonical_name("data.zip"), "data.csv");
    }

    #[test]
    fn test_canonical_name_passthrough() {
        assert_eq!(canonical_name("notes.txt"), "notes.txt");
    }

    #[test]
    fn test_diff_matches_by_canonical_name() {
        let source = vec![record("a.csv.zst"), record("b.csv.zst"), record("c.csv.zst")];
        let dest = vec![record("b.csv")];

        let candidates = diff(&source, &dest, None);
        let names: Vec<_> = candidates.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv.zst", "c.csv.zst"]);
    }

    #[test]
    fn test_diff_is_deterministic_and_sorted() {
        let source = vec![record("c.csv.zst"), record("a.csv.zst"), record("b.csv.zst")];
        let first = diff(&source, &[], None);
        let second = diff(&source, &[], None);

        assert_eq!(first, second);
        let names: Vec<_> = first.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv.zst", "b.csv.zst", "c.csv.zst"]);
    }

    #[test]
    fn test_diff_limit_truncates_after_sort() {
        let source = vec![record("c.csv.zst"), record("a.csv.zst"), record("b.csv.zst")];
        let candidates = diff(&source, &[], Some(2));
        let names: Vec<_> = candidates.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv.zst", "b.csv.zst"]);

        // Zero means "no limit", matching the CLI default.
        assert_eq!(diff(&source, &[], Some(0)).len(), 3);
    }

    #[test]
    fn test_diff_empty_destination_processes_everything() {
        let source = vec![record("a.csv.zst"), record("b.csv.zst")];
        assert_eq!(diff(&source, &[], None).len(), 2);
    }

    #[test]
    fn test_caught_up() {
        let source = vec![record("a.csv.zst"), record("b.csv.zst")];
        let dest = vec![record("a.csv.zst"), record("b.csv")];
        assert!(is_caught_up(&source, &dest));

        let dest_partial = vec![record("a.csv.zst")];
        assert!(!is_caught_up(&source, &dest_partial));

        // Empty source is never "caught up"; there is nothing to be caught up on.
        assert!(!is_caught_up(&[], &dest));
    }
}
