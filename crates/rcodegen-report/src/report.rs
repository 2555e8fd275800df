//! Newest-report selection, review-marker detection, old-report deletion.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;

/// The literal substring that marks a report as human-reviewed.
const REVIEW_MARKER: &str = "Date Modified:";

/// Legacy and current report filename date formats (§6.3), tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d_%H%M%S",
    "%Y-%m-%d_%H%M",
    "%Y%m%d-%H%M%S",
    "%Y%m%d-%H%M",
    "%Y-%m-%d",
    "%Y%m%d",
];

/// Return the path in `paths` with the greatest modification time. Missing
/// files are skipped; an empty or all-missing input returns `None`.
pub fn find_newest(paths: &[PathBuf]) -> Option<PathBuf> {
    paths
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok().and_then(|m| m.modified().ok()).map(|m| (p, m)))
        .max_by_key(|(_, mtime)| *mtime)
        .map(|(p, _)| p.clone())
}

/// Whether the first 10 lines of `path` contain the review marker.
/// Nonexistent files are treated as unreviewed.
pub fn is_reviewed(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let reader = BufReader::new(file);
    reader
        .lines()
        .take(10)
        .filter_map(|l| l.ok())
        .any(|line| line.contains(REVIEW_MARKER))
}

/// Whether a task runner should skip re-running because the previous report
/// for `filename_prefix` exists and is unreviewed.
///
/// `task` is accepted for call-site symmetry with the grades store's keying
/// scheme but does not itself narrow the glob — the prefix alone identifies
/// the report family on disk.
pub fn should_skip(report_dir: &Path, _task: &str, filename_prefix: &str, require_review: bool) -> bool {
    if !require_review || filename_prefix.is_empty() {
        return false;
    }
    let candidates = glob_reports(report_dir, filename_prefix);
    if candidates.is_empty() {
        return false;
    }
    match find_newest(&candidates) {
        None => false,
        Some(newest) => !is_reviewed(&newest),
    }
}

/// For each task in `task_names`, glob its reports (via `prefix_map`), keep
/// only the newest, and delete the rest. Deletion errors for individual
/// files are logged and skipped rather than aborting the whole pass.
pub fn delete_old(report_dir: &Path, task_names: &[String], prefix_map: &HashMap<String, String>) {
    for task in task_names {
        let Some(prefix) = prefix_map.get(task) else {
            continue;
        };
        let mut candidates = glob_reports(report_dir, prefix);
        if candidates.len() <= 1 {
            continue;
        }
        candidates.sort_by_key(|p| std::cmp::Reverse(mtime_of(p)));
        for stale in &candidates[1..] {
            if let Err(e) = std::fs::remove_file(stale) {
                tracing::warn!(path = %stale.display(), error = %e, "failed to delete old report");
            }
        }
    }
}

fn glob_reports(report_dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let pattern = format!("{}/{prefix}*", report_dir.display());
    match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(_) => Vec::new(),
    }
}

fn mtime_of(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Try each of [`DATE_FORMATS`] against every `-`-delimited suffix run of
/// `filename`, since the date component's position varies between the
/// current and legacy naming schemes. Used to validate/recognize report
/// filenames; `find_newest` itself relies on filesystem mtime only.
pub fn parse_report_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    let parts: Vec<&str> = stem.split('-').collect();
    for start in 0..parts.len() {
        let candidate = parts[start..].join("-");
        for fmt in DATE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
                return Some(dt);
            }
            if let Ok(date) = chrono::NaiveDate::parse_from_str(&candidate, fmt) {
                return Some(date.and_hms_opt(0, 0, 0).unwrap());
            }
        }
    }
    None
}
