//! The task runner algorithm itself (spec §4.11 steps 2-10): lock, review
//! gate, prompt render, single-step dispatch through the tool executor,
//! report discovery, grade extraction/append, old-report pruning, runlog.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use rcodegen_context::ResolutionContext;
use rcodegen_core::error::CoreError;
use rcodegen_core::tool::ToolName;
use rcodegen_core::CancelToken;
use rcodegen_executor::ToolExecutor;
use rcodegen_orchestrator::{Step, StepExecutor};
use rcodegen_workspace::Workspace;

use crate::grade::{discover_report, extract_grade};
use crate::prompt::render_prompt;
use crate::runlog::{write_runlog, RunLogEntry};

/// Everything the task runner needs to execute one tool invocation for one
/// task, independent of how the caller (a per-tool CLI) gathered it.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Sanitization-ready identifier for the codebase lock (spec §4.3).
    pub codebase_identifier: String,
    pub tool: ToolName,
    pub task: String,
    pub model: Option<String>,
    pub effort: Option<String>,
    pub budget_usd: Option<f64>,
    /// Prompt template using the `{report_dir}`/`{timestamp}` literal
    /// placeholders (not the `${...}` context language).
    pub prompt_template: String,
    pub report_dir: PathBuf,
    pub lock_dir: PathBuf,
    pub workspace_root: PathBuf,
    /// Report filename prefix (e.g. `rcodegen-claude-audit-`).
    pub filename_prefix: String,
    pub require_review: bool,
    pub delete_old: bool,
    pub lock_enabled: bool,
}

/// Outcome of one [`run_task`] call, distinguishing the "did not even run"
/// cases (spec §6.6 exit codes) from a completed subprocess.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Previous report for this task existed and was unreviewed; the run
    /// was skipped without spawning a subprocess (exit 0).
    SkippedUnreviewed,
    /// The codebase lock could not be acquired within its timeout (exit 1).
    LockTimeout,
    /// Cancellation was observed while waiting on the lock (exit 1).
    Cancelled,
    /// The tool ran to completion; `exit_code` mirrors the subprocess exit
    /// status (spec §7 propagation policy).
    Completed {
        exit_code: i32,
        grade: Option<f64>,
        report_path: Option<PathBuf>,
    },
}

impl TaskOutcome {
    /// The process exit code this outcome maps to (spec §6.6).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SkippedUnreviewed => 0,
            Self::LockTimeout | Self::Cancelled => 1,
            Self::Completed { exit_code, .. } => *exit_code,
        }
    }
}

/// Run one single-tool task end to end (spec §4.11). `executor` is the
/// already-configured [`ToolExecutor`] for `request.tool`; the caller's
/// composition root owns the registry this came from.
pub async fn run_task(
    request: &TaskRequest,
    executor: &ToolExecutor,
    cancel: &CancelToken,
) -> Result<TaskOutcome> {
    let start = Utc::now();

    let lock = match rcodegen_lock::acquire(
        &request.lock_dir,
        &request.codebase_identifier,
        request.lock_enabled,
        cancel,
    )
    .await
    {
        Ok(handle) => handle,
        Err(CoreError::LockTimeout) => return Ok(TaskOutcome::LockTimeout),
        Err(CoreError::Cancelled) => return Ok(TaskOutcome::Cancelled),
        Err(e) => return Err(e.into()),
    };

    if request.require_review
        && rcodegen_report::should_skip(
            &request.report_dir,
            &request.task,
            &request.filename_prefix,
            request.require_review,
        )
    {
        tracing::info!(task = %request.task, "previous report unreviewed, skipping run");
        rcodegen_lock::release(lock);
        return Ok(TaskOutcome::SkippedUnreviewed);
    }

    let prompt = render_prompt(&request.prompt_template, &request.report_dir);

    let step = Step {
        name: request.task.clone(),
        tool: Some(request.tool.as_str().to_string()),
        model: request.model.clone(),
        effort: request.effort.clone(),
        budget_usd: request.budget_usd,
        prompt: Some(prompt),
        ..Default::default()
    };

    let ctx = ResolutionContext::new(HashMap::new());
    let workspace = Workspace::new(&request.workspace_root)?;

    let envelope = executor.execute(&step, &ctx, &workspace, cancel).await;
    let exit_code = exit_code_of(&envelope);

    let discovered = discover_report(&request.report_dir, &request.filename_prefix, &request.task, cancel).await;
    let grade = discovered.as_deref().and_then(extract_grade_from_path);

    if let (Some(path), Some(grade)) = (&discovered, grade) {
        if let Some(basename) = path.file_name().and_then(|n| n.to_str()) {
            if let Err(e) = rcodegen_report::append_grade(
                &request.report_dir,
                basename,
                request.tool.as_str(),
                &request.task,
                grade,
                &start.to_rfc3339(),
            ) {
                tracing::warn!(error = %e, "failed to append grade");
            }
        }
    }

    if request.delete_old && exit_code == 0 {
        let task_names = vec![request.task.clone()];
        let mut prefix_map = HashMap::new();
        prefix_map.insert(request.task.clone(), request.filename_prefix.clone());
        rcodegen_report::delete_old(&request.report_dir, &task_names, &prefix_map);
    }

    let end = Utc::now();
    let entry = RunLogEntry {
        start,
        end,
        duration_ms: (end - start).num_milliseconds().max(0) as u64,
        argv_summary: format!("{} {}", request.tool.as_str(), request.task),
        model: request.model.clone(),
        exit_code,
        grade,
    };
    if let Err(e) = write_runlog(&request.report_dir, &request.task, &entry) {
        tracing::warn!(error = %e, "failed to write runlog");
    }

    rcodegen_lock::release(lock);

    Ok(TaskOutcome::Completed {
        exit_code,
        grade,
        report_path: discovered,
    })
}

/// Map an envelope to a process exit code: 0 for success, the numeric
/// suffix of an `EXIT_<n>` failure code when present, 1 otherwise (spec §7:
/// "the task runner treats the subprocess exit code as its own exit code").
fn exit_code_of(envelope: &rcodegen_core::Envelope) -> i32 {
    if envelope.is_success() {
        return 0;
    }
    envelope
        .error
        .as_ref()
        .and_then(|e| e.code.strip_prefix("EXIT_"))
        .and_then(|n| n.parse::<i32>().ok())
        .unwrap_or(1)
}

fn extract_grade_from_path(path: &Path) -> Option<f64> {
    let text = std::fs::read_to_string(path).ok()?;
    extract_grade(&text)
}
