//! The tool executor (C7): implements `rcodegen_orchestrator::StepExecutor`
//! for a single [`ToolName`], carrying out the full §4.7 algorithm —
//! substitute, assemble argv, tee-spawn, post-process, write output, build
//! envelope. One instance is registered per tool under its `as_str()` name
//! (spec §9 "Factory wiring"): the orchestrator never knows which concrete
//! tool it's talking to.

use std::time::Instant;

use async_trait::async_trait;
use rcodegen_config::PricingConfig;
use rcodegen_context::ResolutionContext;
use rcodegen_core::error::CoreError;
use rcodegen_core::tool::ToolName;
use rcodegen_core::{CancelToken, Envelope};
use rcodegen_orchestrator::{Step, StepExecutor};
use rcodegen_process::{CaptureOutcome, DEFAULT_IDLE_TIMEOUT, DEFAULT_WALL_CLOCK_TIMEOUT};
use rcodegen_workspace::Workspace;
use serde::Serialize;

use crate::adapter;
use crate::session::extract_session_id;
use crate::stream::classify_stream;
use crate::usage::extract_usage;

#[derive(Serialize)]
struct StepOutput {
    stdout: String,
    stderr: String,
}

/// Executes `tool`-shaped steps for one fixed [`ToolName`], against one
/// configured binary name and pricing table.
pub struct ToolExecutor {
    tool: ToolName,
    binary: String,
    pricing: PricingConfig,
}

impl ToolExecutor {
    pub fn new(tool: ToolName, binary: impl Into<String>, pricing: PricingConfig) -> Self {
        Self { tool, binary: binary.into(), pricing }
    }
}

#[async_trait]
impl StepExecutor for ToolExecutor {
    async fn execute(&self, step: &Step, ctx: &ResolutionContext, workspace: &Workspace, cancel: &CancelToken) -> Envelope {
        let started = Instant::now();

        let prompt = ctx.substitute(step.prompt.as_deref().unwrap_or(""));
        let session_id = ctx.tool_session(self.tool.as_str());

        let assembled = match adapter::build_command(
            self.tool,
            &self.binary,
            workspace.job_dir(),
            &prompt,
            step.model.as_deref(),
            step.effort.as_deref(),
            step.budget_usd,
            session_id.as_deref(),
        ) {
            Ok(assembled) => assembled,
            Err(err) => return err.into_failure_envelope(),
        };

        let child = match rcodegen_process::spawn(assembled.command, assembled.stdin_data).await {
            Ok(child) => child,
            // No subprocess ever started: closest documented code is a
            // conventional "command not found" exit status.
            Err(err) => {
                tracing::error!(tool = self.tool.as_str(), step = %step.name, error = %err, "failed to spawn subprocess");
                return CoreError::Exit(127).into_failure_envelope();
            }
        };

        let log_path = workspace.log_path(&step.name);
        let capture = match rcodegen_process::wait_and_capture(
            child,
            Some(&log_path),
            DEFAULT_IDLE_TIMEOUT,
            DEFAULT_WALL_CLOCK_TIMEOUT,
            cancel,
        )
        .await
        {
            Ok(capture) => capture,
            Err(err) => {
                tracing::error!(tool = self.tool.as_str(), step = %step.name, error = %err, "failed to capture subprocess output");
                return CoreError::Exit(1).into_failure_envelope();
            }
        };

        if let Some(sid) = extract_session_id(self.tool, &capture.stdout, &capture.stderr) {
            ctx.set_tool_session(self.tool.as_str(), sid);
        }

        // Classified purely for the live-display interface (§6.2); does not
        // affect envelope correctness, so a logging sink is sufficient until
        // a display collaborator is wired in by the composition root.
        for event in classify_stream(&capture.stdout) {
            tracing::trace!(tool = self.tool.as_str(), step = %step.name, ?event, "stream event");
        }

        let usage = extract_usage(self.tool, &capture.stdout, &capture.stderr, &self.pricing);

        let output = StepOutput { stdout: capture.stdout.clone(), stderr: capture.stderr.clone() };
        let output_ref = match workspace.write_output(&step.name, &output) {
            Ok(path) => path,
            Err(err) => return CoreError::OutputWriteError(err.to_string()).into_failure_envelope(),
        };

        let base = match capture.outcome {
            CaptureOutcome::Exited(0) => Envelope::success(),
            CaptureOutcome::Exited(n) => Envelope::failure(format!("EXIT_{n}"), last_non_empty_line(&capture.stderr)),
            CaptureOutcome::IdleTimedOut | CaptureOutcome::WallClockTimedOut => CoreError::Timeout.into_failure_envelope(),
            CaptureOutcome::Cancelled => CoreError::Cancelled.into_failure_envelope(),
        };

        let mut envelope = base
            .with_output_ref(output_ref)
            .with_tool(self.tool.as_str())
            .with_duration_ms(started.elapsed().as_millis() as u64)
            .with_result("cost_usd", usage.cost_usd)
            .with_result("input_tokens", usage.input_tokens)
            .with_result("output_tokens", usage.output_tokens)
            .with_result("cache_read_tokens", usage.cache_read_tokens)
            .with_result("cache_write_tokens", usage.cache_write_tokens);

        if let Some(sid) = ctx.tool_session(self.tool.as_str()) {
            envelope = envelope.with_session_id(sid);
        }

        envelope
    }
}

/// The last non-empty line of `text`, or the empty string if there is none —
/// used as the failure message for a non-zero subprocess exit (spec §4.7
/// step 7).
fn last_non_empty_line(text: &str) -> String {
    text.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_non_empty_line_skips_trailing_blank_lines() {
        assert_eq!(last_non_empty_line("first\nsecond\n\n\n"), "second");
    }

    #[test]
    fn last_non_empty_line_of_all_blank_is_empty_string() {
        assert_eq!(last_non_empty_line("\n\n  \n"), "");
    }

    #[test]
    fn last_non_empty_line_of_empty_is_empty_string() {
        assert_eq!(last_non_empty_line(""), "");
    }
}
