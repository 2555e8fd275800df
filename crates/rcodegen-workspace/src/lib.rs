//! Per-job on-disk scratch area (spec component C2).
//!
//! A *job* is a directory named `YYYYMMDD-HHMMSS-<random>` under a
//! configurable base directory, holding `outputs/<step-name>.json` (step
//! output files) and `logs/<step-name>.log` (streamed subprocess output).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;

/// A single run's scratch directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    job_dir: PathBuf,
    outputs_dir: PathBuf,
    log_dir: PathBuf,
}

impl Workspace {
    /// Create a fresh job directory under `base_dir`.
    ///
    /// Fails only on filesystem error, including the case where the
    /// generated job id collides with an existing directory — callers may
    /// retry with a freshly generated id.
    pub fn new(base_dir: &Path) -> Result<Self> {
        let job_id = generate_job_id();
        let job_dir = base_dir.join(&job_id);

        fs::create_dir_all(base_dir)
            .with_context(|| format!("creating workspace base dir {}", base_dir.display()))?;

        fs::create_dir(&job_dir)
            .with_context(|| format!("creating job dir {} (id collision?)", job_dir.display()))?;

        let outputs_dir = job_dir.join("outputs");
        let log_dir = job_dir.join("logs");
        fs::create_dir_all(&outputs_dir)
            .with_context(|| format!("creating outputs dir {}", outputs_dir.display()))?;
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("creating log dir {}", log_dir.display()))?;

        tracing::debug!(job_dir = %job_dir.display(), "created workspace job directory");

        Ok(Self {
            job_dir,
            outputs_dir,
            log_dir,
        })
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path a step's log file will live at, whether or not it exists yet.
    pub fn log_path(&self, step_name: &str) -> PathBuf {
        self.log_dir.join(format!("{step_name}.log"))
    }

    /// Serialize `value` as JSON into `outputs/<step_name>.json` and return
    /// its absolute path.
    pub fn write_output<T: Serialize>(&self, step_name: &str, value: &T) -> Result<PathBuf> {
        if step_name.is_empty() {
            bail!("step name must not be empty");
        }
        let path = self.outputs_dir.join(format!("{step_name}.json"));
        let json = serde_json::to_vec_pretty(value).context("serializing step output")?;
        fs::write(&path, json)
            .with_context(|| format!("writing step output to {}", path.display()))?;
        path.canonicalize()
            .or_else(|_| Ok(path.clone()))
    }

    /// Copy the bundle definition file into the job directory for
    /// reproducibility, best-effort in the sense that a write failure here
    /// is surfaced to the caller but never invented silently.
    pub fn copy_bundle_definition(&self, bundle_source: &Path) -> Result<PathBuf> {
        let file_name = bundle_source
            .file_name()
            .context("bundle source path has no file name")?;
        let dest = self.job_dir.join(file_name);
        fs::copy(bundle_source, &dest).with_context(|| {
            format!(
                "copying bundle definition from {} to {}",
                bundle_source.display(),
                dest.display()
            )
        })?;
        Ok(dest)
    }
}

/// Generate a job id: `YYYYMMDD-HHMMSS-<random>`, with the random suffix
/// drawn from a freshly generated ULID's randomness component (80 bits,
/// well over the 64-bit collision floor) so no new RNG dependency is
/// needed beyond the one already carried for identifiers elsewhere.
fn generate_job_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let random = ulid::Ulid::new().to_string().to_lowercase();
    // Keep only the randomness-derived tail of the ULID (the first 10 chars
    // encode a millisecond timestamp we already have via `timestamp`).
    let random_suffix = &random[10..];
    format!("{timestamp}-{random_suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_creates_outputs_and_logs_dirs() {
        let base = tempdir().unwrap();
        let ws = Workspace::new(base.path()).unwrap();
        assert!(ws.outputs_dir().is_dir());
        assert!(ws.log_dir().is_dir());
        assert!(ws.job_dir().starts_with(base.path()));
    }

    #[test]
    fn two_workspaces_get_distinct_job_dirs() {
        let base = tempdir().unwrap();
        let ws1 = Workspace::new(base.path()).unwrap();
        let ws2 = Workspace::new(base.path()).unwrap();
        assert_ne!(ws1.job_dir(), ws2.job_dir());
    }

    #[test]
    fn write_output_round_trips_json() {
        let base = tempdir().unwrap();
        let ws = Workspace::new(base.path()).unwrap();

        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Payload {
            stdout: String,
            stderr: String,
        }

        let value = Payload {
            stdout: "hello".into(),
            stderr: String::new(),
        };
        let path = ws.write_output("step-a", &value).unwrap();
        assert!(path.is_absolute());
        let contents = fs::read_to_string(&path).unwrap();
        let decoded: Payload = serde_json::from_str(&contents).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn write_output_rejects_empty_step_name() {
        let base = tempdir().unwrap();
        let ws = Workspace::new(base.path()).unwrap();
        let result = ws.write_output("", &serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn log_path_is_under_log_dir() {
        let base = tempdir().unwrap();
        let ws = Workspace::new(base.path()).unwrap();
        let log_path = ws.log_path("my-step");
        assert!(log_path.starts_with(ws.log_dir()));
        assert_eq!(log_path.file_name().unwrap(), "my-step.log");
    }

    #[test]
    fn copy_bundle_definition_copies_into_job_dir() {
        let base = tempdir().unwrap();
        let ws = Workspace::new(base.path()).unwrap();

        let bundle_src_dir = tempdir().unwrap();
        let bundle_path = bundle_src_dir.path().join("bundle.toml");
        fs::write(&bundle_path, "name = \"demo\"\n").unwrap();

        let dest = ws.copy_bundle_definition(&bundle_path).unwrap();
        assert!(dest.starts_with(ws.job_dir()));
        assert_eq!(fs::read_to_string(dest).unwrap(), "name = \"demo\"\n");
    }

    #[test]
    fn job_id_has_expected_shape() {
        let id = generate_job_id();
        // YYYYMMDD-HHMMSS-<random>
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert!(!parts[2].is_empty());
    }
}
