//! Home-directory resolution and trusted helper-script discovery (spec
//! §6.5, §9 "Script path safety").

use std::path::{Path, PathBuf};

/// Resolve the user's home directory: prefer the OS API (via `directories`),
/// fall back to the `HOME` environment variable, and if neither yields a
/// non-empty value, return `None` — callers must never concatenate an empty
/// home onto a path.
pub fn home_dir() -> Option<PathBuf> {
    if let Some(base_dirs) = directories::BaseDirs::new() {
        let home = base_dirs.home_dir();
        if !home.as_os_str().is_empty() {
            return Some(home.to_path_buf());
        }
    }
    std::env::var("HOME")
        .ok()
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~` against [`home_dir`]. Returns `path` unexpanded if it
/// doesn't start with `~` or if no home directory can be resolved.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(stripped) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir() {
        Some(home) => home.join(stripped),
        None => path.to_path_buf(),
    }
}

/// Directory under the user's home where trusted helper scripts (PTY
/// wrappers, status probes) may be installed.
pub fn trusted_scripts_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".rcodegen").join("scripts"))
}

/// Discover a helper script by name, searching only trusted locations:
/// the directory of the running executable, then `~/.rcodegen/scripts/`.
///
/// The current working directory is deliberately never searched — see
/// spec §9, "Script path safety".
pub fn discover_script(name: &str) -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidate = exe_dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    if let Some(scripts_dir) = trusted_scripts_dir() {
        let candidate = scripts_dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    None
}
