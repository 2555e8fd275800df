//! Append-only grades store: `<report-dir>/.grades.json`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const GRADES_FILE_NAME: &str = ".grades.json";

/// Serializes calls to [`append_grade`] within this process. The grades
/// store makes no claim of cross-process safety — callers who need that
/// hold the codebase lock around the whole read-modify-write.
static APPEND_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub date: String,
    pub tool: String,
    pub task: String,
    pub grade: f64,
    pub report_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradesFile {
    pub grades: Vec<GradeEntry>,
}

/// Load `.grades.json` from `dir`. A missing file is an empty list, not an
/// error; malformed JSON is.
pub fn load_grades(dir: &Path) -> Result<GradesFile> {
    let path = dir.join(GRADES_FILE_NAME);
    if !path.exists() {
        return Ok(GradesFile::default());
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("reading grades file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing grades file {}", path.display()))
}

/// Write `grades` atomically: temp file with `0600` perms in the same
/// directory, then rename. On rename failure, best-effort remove the temp
/// file before returning the error.
pub fn save_grades(dir: &Path, grades: &GradesFile) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating report dir {}", dir.display()))?;
    let path = dir.join(GRADES_FILE_NAME);
    let tmp_path = dir.join(format!(".grades.json.tmp-{}", std::process::id()));

    let json = serde_json::to_vec_pretty(grades).context("serializing grades")?;
    fs::write(&tmp_path, &json)
        .with_context(|| format!("writing temp grades file {}", tmp_path.display()))?;
    fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("setting permissions on {}", tmp_path.display()))?;

    if let Err(e) = fs::rename(&tmp_path, &path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()));
    }
    Ok(())
}

/// Append an entry, deduplicated by `report_file`: if an entry with the same
/// basename already exists, this is a no-op and the first-stored grade is
/// preserved. Returns whether an entry was actually appended.
pub fn append_grade(
    dir: &Path,
    report_file: &str,
    tool: &str,
    task: &str,
    grade: f64,
    date: &str,
) -> Result<bool> {
    let _guard = APPEND_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let mut file = load_grades(dir)?;
    if file.grades.iter().any(|g| g.report_file == report_file) {
        return Ok(false);
    }
    file.grades.push(GradeEntry {
        date: date.to_string(),
        tool: tool.to_string(),
        task: task.to_string(),
        grade,
        report_file: report_file.to_string(),
    });
    save_grades(dir, &file)?;
    Ok(true)
}
