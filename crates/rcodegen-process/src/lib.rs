//! Subprocess streaming substrate shared by every tool adapter: spawn,
//! byte-level tee to an in-memory buffer and a log file, idle-timeout and
//! wall-clock-timeout enforcement, and cancellation-aware kill.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rcodegen_core::cancel::CancelToken;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_WALL_CLOCK_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const KILL_GRACE: Duration = Duration::from_secs(5);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);
const READ_BUF_SIZE: usize = 4096;

/// Why capture stopped waiting on the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Exited(i32),
    IdleTimedOut,
    WallClockTimedOut,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub stdout: String,
    pub stderr: String,
    pub outcome: CaptureOutcome,
}

/// Spawn `cmd` with piped stdout/stderr (and stdin when `stdin_data` is
/// given), isolated in its own process group so a later kill can target the
/// whole group rather than just the direct child.
pub async fn spawn(cmd: Command, stdin_data: Option<Vec<u8>>) -> Result<Child> {
    let mut cmd = cmd;
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(if stdin_data.is_some() {
        std::process::Stdio::piped()
    } else {
        std::process::Stdio::null()
    });
    cmd.kill_on_drop(true);

    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = cmd.spawn().context("spawning subprocess")?;

    if let Some(data) = stdin_data {
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = async {
                    stdin.write_all(&data).await?;
                    stdin.shutdown().await
                }
                .await
                {
                    tracing::warn!(error = %e, "stdin write to subprocess failed");
                }
            });
        }
    }

    Ok(child)
}

/// Wait for `child`, tee-ing stdout/stderr to in-memory buffers and, when
/// `log_path` is given, to an append-mode log file (each line prefixed by
/// its stream). If the log file cannot be opened, capture proceeds with
/// the buffers only and logs a warning.
///
/// The child is killed (with a 5s grace period between SIGTERM and SIGKILL)
/// on idle timeout, wall-clock timeout, or cancellation.
pub async fn wait_and_capture(
    mut child: Child,
    log_path: Option<&Path>,
    idle_timeout: Duration,
    wall_clock_timeout: Duration,
    cancel: &CancelToken,
) -> Result<CaptureResult> {
    let stdout = child.stdout.take().context("capturing stdout")?;
    let stderr = child.stderr.take().context("capturing stderr")?;

    let mut log_file = match log_path {
        Some(path) => match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => Some(f),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to open step log file; continuing buffer-only");
                None
            }
        },
        None => None,
    };

    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_buf = [0u8; READ_BUF_SIZE];
    let mut stderr_buf = [0u8; READ_BUF_SIZE];
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut stdout_done = false;
    let mut stderr_done = false;

    let mut last_activity = tokio::time::Instant::now();
    let deadline = tokio::time::Instant::now() + wall_clock_timeout;
    let mut outcome = None;

    while !stdout_done || !stderr_done {
        tokio::select! {
            result = stdout_reader.read(&mut stdout_buf), if !stdout_done => {
                match result {
                    Ok(0) => stdout_done = true,
                    Ok(n) => {
                        last_activity = tokio::time::Instant::now();
                        let chunk = String::from_utf8_lossy(&stdout_buf[..n]);
                        tee_chunk(&chunk, "stdout", &mut log_file);
                        stdout.push_str(&chunk);
                    }
                    Err(_) => stdout_done = true,
                }
            }
            result = stderr_reader.read(&mut stderr_buf), if !stderr_done => {
                match result {
                    Ok(0) => stderr_done = true,
                    Ok(n) => {
                        last_activity = tokio::time::Instant::now();
                        let chunk = String::from_utf8_lossy(&stderr_buf[..n]);
                        tee_chunk(&chunk, "stderr", &mut log_file);
                        stderr.push_str(&chunk);
                    }
                    Err(_) => stderr_done = true,
                }
            }
            _ = cancel.cancelled(), if outcome.is_none() => {
                outcome = Some(CaptureOutcome::Cancelled);
                kill_with_grace(&mut child).await;
                break;
            }
            _ = tokio::time::sleep_until(deadline), if outcome.is_none() => {
                outcome = Some(CaptureOutcome::WallClockTimedOut);
                kill_with_grace(&mut child).await;
                break;
            }
            _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {
                if last_activity.elapsed() >= idle_timeout {
                    outcome = Some(CaptureOutcome::IdleTimedOut);
                    kill_with_grace(&mut child).await;
                    break;
                }
            }
        }
    }

    let outcome = match outcome {
        Some(o) => o,
        None => {
            let status = child.wait().await.context("waiting for subprocess")?;
            CaptureOutcome::Exited(status.code().unwrap_or_else(|| {
                tracing::warn!("subprocess terminated by signal, using exit code 1");
                1
            }))
        }
    };

    Ok(CaptureResult { stdout, stderr, outcome })
}

fn tee_chunk(chunk: &str, stream: &str, log_file: &mut Option<std::fs::File>) {
    if let Some(f) = log_file {
        use std::io::Write;
        for line in chunk.split_inclusive('\n') {
            let _ = write!(f, "[{stream}] {line}");
        }
        let _ = f.flush();
    }
}

async fn kill_with_grace(child: &mut Child) {
    send_signal(child, libc::SIGTERM);
    let exited = tokio::time::timeout(KILL_GRACE, child.wait()).await;
    if exited.is_err() {
        send_signal(child, libc::SIGKILL);
        let _ = child.wait().await;
    }
}

fn send_signal(child: &mut Child, signal: i32) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: signaling a process group this process created is safe;
            // the negative pid targets the whole group set up via setsid().
            unsafe {
                libc::kill(-(pid as i32), signal);
            }
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcodegen_core::cancel::CancelToken;
    use tempfile::tempdir;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let child = spawn(sh("echo out; echo err 1>&2"), None).await.unwrap();
        let cancel = CancelToken::new();
        let result = wait_and_capture(child, None, DEFAULT_IDLE_TIMEOUT, DEFAULT_WALL_CLOCK_TIMEOUT, &cancel)
            .await
            .unwrap();
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
        assert_eq!(result.outcome, CaptureOutcome::Exited(0));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let child = spawn(sh("exit 3"), None).await.unwrap();
        let cancel = CancelToken::new();
        let result = wait_and_capture(child, None, DEFAULT_IDLE_TIMEOUT, DEFAULT_WALL_CLOCK_TIMEOUT, &cancel)
            .await
            .unwrap();
        assert_eq!(result.outcome, CaptureOutcome::Exited(3));
    }

    #[tokio::test]
    async fn writes_tee_log_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("step.log");
        let child = spawn(sh("echo hello"), None).await.unwrap();
        let cancel = CancelToken::new();
        wait_and_capture(child, Some(&log_path), DEFAULT_IDLE_TIMEOUT, DEFAULT_WALL_CLOCK_TIMEOUT, &cancel)
            .await
            .unwrap();
        let log_contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(log_contents.contains("[stdout] hello"));
    }

    #[tokio::test]
    async fn missing_log_dir_falls_back_to_buffer_only() {
        let child = spawn(sh("echo hello"), None).await.unwrap();
        let cancel = CancelToken::new();
        let bogus = Path::new("/nonexistent/dir/step.log");
        let result = wait_and_capture(child, Some(bogus), DEFAULT_IDLE_TIMEOUT, DEFAULT_WALL_CLOCK_TIMEOUT, &cancel)
            .await
            .unwrap();
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn cancellation_kills_subprocess() {
        let child = spawn(sh("sleep 60"), None).await.unwrap();
        let cancel = CancelToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            wait_and_capture(child, None, DEFAULT_IDLE_TIMEOUT, DEFAULT_WALL_CLOCK_TIMEOUT, &cancel),
        )
        .await
        .expect("wait_and_capture did not return promptly after cancellation")
        .unwrap();

        assert_eq!(result.outcome, CaptureOutcome::Cancelled);
    }

    #[tokio::test]
    async fn wall_clock_timeout_kills_subprocess() {
        let child = spawn(sh("sleep 60"), None).await.unwrap();
        let cancel = CancelToken::new();
        let result = wait_and_capture(
            child,
            None,
            DEFAULT_IDLE_TIMEOUT,
            Duration::from_millis(100),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(result.outcome, CaptureOutcome::WallClockTimedOut);
    }

    #[tokio::test]
    async fn idle_timeout_kills_a_silently_hanging_subprocess() {
        let child = spawn(sh("sleep 60"), None).await.unwrap();
        let cancel = CancelToken::new();
        let result = wait_and_capture(
            child,
            None,
            Duration::from_millis(100),
            DEFAULT_WALL_CLOCK_TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(result.outcome, CaptureOutcome::IdleTimedOut);
    }
}
