//! Runtime configuration: workspace/lock/report directories, tool binary
//! overrides, and pricing, loaded from an optional TOML file with the
//! "refuse a world-writable settings file" policy from spec §6.5.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rcodegen_core::error::CoreError;
use serde::{Deserialize, Serialize};

use crate::pricing::PricingConfig;

/// Runtime configuration, code-level defaults cover everything so the core
/// runs with zero configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub workspace_root: PathBuf,
    pub lock_dir: PathBuf,
    pub report_dir: PathBuf,
    #[serde(default)]
    pub tool_binaries: ToolBinaries,
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Per-tool binary name overrides (e.g. for a vendored or renamed CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolBinaries {
    pub claude_code: String,
    pub codex: String,
    pub gemini_cli: String,
    pub opencode: String,
}

impl Default for ToolBinaries {
    fn default() -> Self {
        Self {
            claude_code: "claude".to_string(),
            codex: "codex".to_string(),
            gemini_cli: "gemini".to_string(),
            opencode: "opencode".to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("rcodegen");
        Self {
            workspace_root: base.join("workspace"),
            lock_dir: base.join("locks"),
            report_dir: PathBuf::from("_rcodegen"),
            tool_binaries: ToolBinaries::default(),
            pricing: PricingConfig::default(),
        }
    }
}

/// Load configuration from `path`, falling back to [`RuntimeConfig::default`]
/// when `path` does not exist. Refuses to load a world-writable file
/// (`CoreError::UnsafeSettings`), regardless of content.
pub fn load(path: &Path) -> Result<RuntimeConfig> {
    if !path.exists() {
        return Ok(RuntimeConfig::default());
    }

    refuse_world_writable(path)?;

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing settings file {}", path.display()))
}

#[cfg(unix)]
fn refuse_world_writable(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| CoreError::UnsafeSettings(format!("cannot stat {}: {e}", path.display())))?;
    let mode = metadata.permissions().mode();
    if mode & 0o002 != 0 {
        return Err(CoreError::UnsafeSettings(format!(
            "{} is world-writable (mode {:o})",
            path.display(),
            mode & 0o777
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn refuse_world_writable(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}
