//! The `.runlog` file (spec §4.11 step 9): one JSON record per task
//! invocation, written with mode `0600` the same way `rcodegen_report::grades`
//! writes its store file.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RunLogEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: u64,
    pub argv_summary: String,
    pub model: Option<String>,
    pub exit_code: i32,
    pub grade: Option<f64>,
}

/// Write `entry` to `<report_dir>/<task>.runlog`, restricted to owner
/// read/write. Overwrites any prior runlog for the same task — the store
/// is a last-run record, not a history.
pub fn write_runlog(report_dir: &Path, task: &str, entry: &RunLogEntry) -> Result<PathBuf> {
    fs::create_dir_all(report_dir)
        .with_context(|| format!("creating report dir {}", report_dir.display()))?;
    let path = report_dir.join(format!("{task}.runlog"));
    let json = serde_json::to_vec_pretty(entry).context("serializing runlog entry")?;
    fs::write(&path, &json).with_context(|| format!("writing runlog {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("setting permissions on {}", path.display()))?;
    Ok(path)
}
