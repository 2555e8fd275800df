//! Post-exit report discovery and grade extraction (spec §4.11 steps 6-7).

use std::path::{Path, PathBuf};
use std::time::Duration;

use rcodegen_core::CancelToken;
use rcodegen_report::find_newest;
use regex::Regex;

const DISCOVERY_RETRIES: usize = 10;
const DISCOVERY_INTERVAL: Duration = Duration::from_millis(50);

/// Grade patterns in precedence order (spec §4.11 step 6 / §8 boundary
/// behavior: the first pattern to match wins, even if a lower-precedence
/// pattern would also match).
const GRADE_PATTERNS: &[&str] = &[
    r"TOTAL_SCORE:\s*(\d+(?:\.\d+)?)/100",
    r"Overall Grade:\s*(\d+(?:\.\d+)?)/100",
    r"Grade:\s*(\d+(?:\.\d+)?)/100",
    r"score:\s*(\d+(?:\.\d+)?)/100",
];

/// Poll `report_dir` for a file matching `<prefix>*<task>*.md`, retrying up
/// to [`DISCOVERY_RETRIES`] times at [`DISCOVERY_INTERVAL`] apart. Returns
/// the newest match by mtime, or `None` if nothing ever appeared. Unblocks
/// early on cancellation.
pub async fn discover_report(
    report_dir: &Path,
    prefix: &str,
    task: &str,
    cancel: &CancelToken,
) -> Option<PathBuf> {
    for attempt in 0..DISCOVERY_RETRIES {
        let candidates = glob_candidates(report_dir, prefix, task);
        if let Some(newest) = find_newest(&candidates) {
            return Some(newest);
        }
        if attempt + 1 == DISCOVERY_RETRIES {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(DISCOVERY_INTERVAL) => {}
            _ = cancel.cancelled() => break,
        }
    }
    None
}

fn glob_candidates(report_dir: &Path, prefix: &str, task: &str) -> Vec<PathBuf> {
    let pattern = format!("{}/{prefix}*{task}*.md", report_dir.display());
    match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Extract a numeric grade from `report_text`, trying each of
/// [`GRADE_PATTERNS`] in order and keeping the first match. A matched value
/// outside `0..=100` is treated as no match at all.
pub fn extract_grade(report_text: &str) -> Option<f64> {
    for pattern in GRADE_PATTERNS {
        let Ok(re) = Regex::new(pattern) else { continue };
        let Some(captures) = re.captures(report_text) else { continue };
        let Some(raw) = captures.get(1) else { continue };
        if let Ok(grade) = raw.as_str().parse::<f64>() {
            if (0.0..=100.0).contains(&grade) {
                return Some(grade);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread::sleep;
    use tempfile::tempdir;

    #[test]
    fn total_score_pattern_wins_over_later_patterns() {
        let text = "TOTAL_SCORE: 87.5/100\nGrade: 50/100\n";
        assert_eq!(extract_grade(text), Some(87.5));
    }

    #[test]
    fn falls_back_through_precedence_order() {
        assert_eq!(extract_grade("Overall Grade: 60/100"), Some(60.0));
        assert_eq!(extract_grade("Grade: 70/100"), Some(70.0));
        assert_eq!(extract_grade("score: 80/100"), Some(80.0));
    }

    #[test]
    fn no_pattern_matches_is_none() {
        assert_eq!(extract_grade("no grade here"), None);
    }

    #[test]
    fn out_of_range_grade_is_rejected() {
        assert_eq!(extract_grade("TOTAL_SCORE: 150/100"), None);
    }

    #[tokio::test]
    async fn discover_report_finds_newest_matching_file() {
        let dir = tempdir().unwrap();
        let older = dir.path().join("review-proj-audit-2024-01-01_0000.md");
        fs::write(&older, "old").unwrap();
        sleep(std::time::Duration::from_millis(20));
        let newer = dir.path().join("review-proj-audit-2025-01-01_0000.md");
        fs::write(&newer, "new").unwrap();

        let cancel = CancelToken::new();
        let found = discover_report(dir.path(), "review", "audit", &cancel).await;
        assert_eq!(found, Some(newer));
    }

    #[tokio::test]
    async fn discover_report_gives_up_after_retries_when_nothing_appears() {
        let dir = tempdir().unwrap();
        let cancel = CancelToken::new();
        let found = discover_report(dir.path(), "review", "audit", &cancel).await;
        assert_eq!(found, None);
    }
}
