//! Cross-process advisory exclusion for a codebase identifier, using
//! `flock(2)` directly on a raw file descriptor.
//!
//! A single lock is keyed by a sanitized *codebase identifier* rather than a
//! tool name, with polling/timeout semantics on contention.
//!
//! `flock` is called directly instead of through an RAII lock crate because
//! an RAII guard would need to borrow from the `File` it locks, which is
//! awkward to store in a struct without lifetime gymnastics. Owning the
//! `File` (and its fd) is enough — `Drop` calls `flock(fd, LOCK_UN)` to
//! release.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rcodegen_core::CancelToken;
use rcodegen_core::error::CoreError;

const LOCK_FILE_NAME: &str = "rcodegen.lock";
const LOCK_INFO_FILE_NAME: &str = "rcodegen.lock.info";
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const MAX_IDENTIFIER_BYTES: usize = 100;

/// A held (or deliberately null) advisory lock.
///
/// `enabled = false` produces a `Null` handle: `release` on it is a no-op,
/// so callers don't need to branch on whether locking was enabled.
pub enum LockHandle {
    Held { file: File, info_path: PathBuf },
    Null,
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Held { info_path, .. } => {
                f.debug_struct("LockHandle::Held").field("info_path", info_path).finish()
            }
            Self::Null => write!(f, "LockHandle::Null"),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Self::Held { file, .. } = self {
            // SAFETY: `file`'s fd is valid and owned by this handle for its
            // entire lifetime; LOCK_UN on a valid fd cannot fail in a way
            // that matters here (the fd is about to be closed regardless).
            unsafe {
                libc::flock(file.as_raw_fd(), libc::LOCK_UN);
            }
        }
    }
}

/// Sanitize a codebase identifier for use as part of a filename / log line:
/// replace path separators, NUL, and non-printable bytes with `_`, truncate
/// to 100 bytes, and fall back to `"unknown"` if that leaves nothing.
pub fn sanitize_identifier(identifier: &str) -> String {
    let replaced: String = identifier
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let mut truncated = String::new();
    let mut byte_len = 0;
    for ch in replaced.chars() {
        let ch_len = ch.len_utf8();
        if byte_len + ch_len > MAX_IDENTIFIER_BYTES {
            break;
        }
        truncated.push(ch);
        byte_len += ch_len;
    }

    if truncated.is_empty() {
        "unknown".to_string()
    } else {
        truncated
    }
}

/// Acquire the advisory exclusive lock for `identifier` under `lock_dir`.
///
/// `enabled = false` skips locking entirely and returns [`LockHandle::Null`].
/// On contention, polls every 5 seconds for up to 5 minutes, logging the
/// current holder (read from the `.lock.info` sidecar) on each wait.
/// Returns [`CoreError::LockTimeout`] if the lock is never acquired, or
/// [`CoreError::Cancelled`] if `cancel` is raised while waiting.
pub async fn acquire(
    lock_dir: &Path,
    identifier: &str,
    enabled: bool,
    cancel: &CancelToken,
) -> Result<LockHandle, CoreError> {
    if !enabled {
        return Ok(LockHandle::Null);
    }

    let sanitized = sanitize_identifier(identifier);

    fs::create_dir_all(lock_dir)
        .map_err(|e| CoreError::OutputWriteError(format!("creating lock dir: {e}")))?;

    let lock_path = lock_dir.join(LOCK_FILE_NAME);
    let info_path = lock_dir.join(LOCK_INFO_FILE_NAME);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| CoreError::OutputWriteError(format!("opening lock file: {e}")))?;

    let deadline = tokio::time::Instant::now() + ACQUIRE_TIMEOUT;

    loop {
        match try_lock(&file) {
            Ok(()) => {
                let _ = write_lock_info(&info_path, &sanitized);
                return Ok(LockHandle::Held { file, info_path });
            }
            Err(TryLockError::WouldBlock) => {
                if tokio::time::Instant::now() >= deadline {
                    return Err(CoreError::LockTimeout);
                }
                let holder = read_holder(&info_path).unwrap_or_else(|| "<unknown>".to_string());
                tracing::info!(
                    identifier = %sanitized,
                    holder = %holder,
                    "waiting for codebase lock"
                );
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                }
            }
            Err(TryLockError::Io(e)) => {
                return Err(CoreError::OutputWriteError(format!("flock failed: {e}")));
            }
        }
    }
}

/// Release a previously-acquired lock. A no-op on [`LockHandle::Null`].
/// Removing the `.lock.info` sidecar is best-effort and never fails this
/// call.
pub fn release(handle: LockHandle) {
    if let LockHandle::Held { info_path, .. } = &handle {
        let _ = fs::remove_file(info_path);
    }
    // Explicit unlock happens in Drop; this fn exists so call sites have a
    // named release point even though dropping the handle suffices.
    drop(handle);
}

enum TryLockError {
    WouldBlock,
    Io(io::Error),
}

fn try_lock(file: &File) -> Result<(), TryLockError> {
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EWOULDBLOCK => Err(TryLockError::WouldBlock),
            _ => Err(TryLockError::Io(err)),
        }
    }
}

fn write_lock_info(info_path: &Path, identifier: &str) -> io::Result<()> {
    let mut f = File::create(info_path)?;
    f.write_all(identifier.as_bytes())
}

fn read_holder(info_path: &Path) -> Option<String> {
    let mut contents = String::new();
    File::open(info_path).ok()?.read_to_string(&mut contents).ok()?;
    let trimmed = contents.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}
