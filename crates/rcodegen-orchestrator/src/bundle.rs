//! The bundle engine (C10): sequential walk of a step list with conditional
//! branching, a run journal of completed steps, and the full
//! then/else/parallel/merge/vote shape.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rcodegen_core::error::CoreError;
use rcodegen_core::{CancelToken, Envelope, StepStatus};
use rcodegen_context::{ResolutionContext, evaluate_condition};
use rcodegen_workspace::Workspace;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::dispatch::dispatch_step;
use crate::executor_trait::ExecutorRegistry;
use crate::step::{Bundle, InputSpec, Step};

/// Whether a failed step inside a run should fail the whole run. The two
/// Open Questions the distilled spec leaves open (see DESIGN.md) are both
/// knobs here rather than hardcoded behavior.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// If true, a `partial` top-level parallel step's failure does not fail
    /// the run by itself (only an outright `failure` status does).
    pub tolerate_partial: bool,
    /// Global model override applied to every dispatched step without
    /// mutating the loaded bundle definition.
    pub model_override: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tolerate_partial: true,
            model_override: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BundleRunError {
    #[error("missing required input '{0}'")]
    MissingRequiredInput(String),
    #[error(transparent)]
    Workspace(#[from] anyhow::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct FinalReport {
    bundle: String,
    status: StepStatus,
    step_count: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
}

/// Run a bundle to completion. Returns the run envelope (status reflects
/// whether any step failed in a way the run didn't tolerate) plus the
/// workspace the run executed in, so the caller can inspect step outputs.
pub async fn run_bundle(
    bundle: &Bundle,
    bundle_source: Option<&Path>,
    inputs: HashMap<String, String>,
    base_dir: &Path,
    registry: Arc<ExecutorRegistry>,
    cancel: CancelToken,
    options: RunOptions,
) -> Result<(Envelope, Workspace), BundleRunError> {
    let workspace = Workspace::new(base_dir)?;
    if let Some(source) = bundle_source {
        // Best-effort: reproducibility copy, not fatal to the run.
        if let Err(e) = workspace.copy_bundle_definition(source) {
            tracing::warn!(error = %e, "failed to copy bundle definition into workspace");
        }
    }

    let resolved_inputs = resolve_inputs(bundle, inputs)?;
    let ctx = Arc::new(ResolutionContext::new(resolved_inputs));
    let workspace = Arc::new(workspace);

    let mut any_unresolved_failure = false;
    let mut was_cancelled = false;

    for step in &bundle.steps {
        if cancel.is_cancelled() {
            tracing::info!(step = %step.name, "cancellation observed, stopping dispatch of remaining steps");
            was_cancelled = true;
            break;
        }

        let envelope = run_one_step(step, &ctx, &workspace, &registry, &cancel, &options).await;
        let tolerated_partial = options.tolerate_partial && envelope.status == StepStatus::Partial;
        if (envelope.is_failure() || envelope.status == StepStatus::Partial) && !tolerated_partial {
            any_unresolved_failure = true;
        }
        ctx.record_step_result(&step.name, envelope);
    }

    let summary = summarize(bundle, &ctx);
    if let Err(e) = workspace.write_output("_final_report", &summary) {
        tracing::warn!(error = %e, "failed to write final report");
    }

    // A run cancelled mid-walk must fail regardless of how the steps that
    // did complete turned out (spec §6.6): a clean run of steps 1..n-1
    // followed by a cancelled step n+1 is still a cancelled run, not a
    // success.
    let run_envelope = if was_cancelled {
        CoreError::Cancelled.into_failure_envelope()
    } else if any_unresolved_failure {
        Envelope::failure("EXIT_1", "one or more bundle steps failed")
    } else {
        Envelope::success()
    }
    .with_result("steps", summary.step_count as i64)
    .with_result("succeeded", summary.succeeded as i64)
    .with_result("failed", summary.failed as i64)
    .with_result("skipped", summary.skipped as i64);

    let workspace = Arc::try_unwrap(workspace).unwrap_or_else(|arc| (*arc).clone());
    Ok((run_envelope, workspace))
}

/// Dispatch exactly one step, honoring the then/else/skip/dispatch rules of
/// spec §4.10 step 4. Exactly one of {then, else, skipped} runs when `then`
/// is present; the else branch is never unreachable (an absent `else`
/// degrades to `skipped`, never to silently doing nothing without a status).
async fn run_one_step(
    step: &Step,
    ctx: &Arc<ResolutionContext>,
    workspace: &Arc<Workspace>,
    registry: &Arc<ExecutorRegistry>,
    cancel: &CancelToken,
    options: &RunOptions,
) -> Envelope {
    if let Some(then_step) = &step.then {
        let condition_true = evaluate_condition(&ctx.substitute(step.if_expr.as_deref().unwrap_or("")));
        if condition_true {
            return dispatch_with_override(then_step, ctx, workspace, registry, cancel, options).await;
        }
        return match &step.else_step {
            Some(else_step) => dispatch_with_override(else_step, ctx, workspace, registry, cancel, options).await,
            None => Envelope::skipped(),
        };
    }

    if let Some(if_expr) = &step.if_expr {
        if !if_expr.is_empty() {
            let condition_true = evaluate_condition(&ctx.substitute(if_expr));
            if !condition_true {
                return Envelope::skipped();
            }
        }
    }

    dispatch_with_override(step, ctx, workspace, registry, cancel, options).await
}

/// Apply the optional global model override without mutating the loaded
/// bundle: clone the step, overwrite `model` on the clone, dispatch that.
async fn dispatch_with_override(
    step: &Step,
    ctx: &Arc<ResolutionContext>,
    workspace: &Arc<Workspace>,
    registry: &Arc<ExecutorRegistry>,
    cancel: &CancelToken,
    options: &RunOptions,
) -> Envelope {
    let effective = match &options.model_override {
        Some(model) => {
            let mut cloned = step.clone();
            cloned.model = Some(model.clone());
            cloned
        }
        None => step.clone(),
    };
    dispatch_step(effective, Arc::clone(ctx), Arc::clone(workspace), Arc::clone(registry), cancel.clone()).await
}

/// Validate/fill bundle inputs: required inputs must be present, unknown
/// inputs pass through unchanged, declared-but-missing optional inputs take
/// their default.
fn resolve_inputs(
    bundle: &Bundle,
    mut inputs: HashMap<String, String>,
) -> Result<HashMap<String, String>, BundleRunError> {
    for (name, spec) in &bundle.inputs {
        if !inputs.contains_key(name) {
            match spec_default(spec) {
                Some(default) => {
                    inputs.insert(name.clone(), default);
                }
                None if spec.required => {
                    return Err(BundleRunError::MissingRequiredInput(name.clone()));
                }
                None => {}
            }
        }
    }
    Ok(inputs)
}

fn spec_default(spec: &InputSpec) -> Option<String> {
    spec.default.clone()
}

fn summarize(bundle: &Bundle, ctx: &ResolutionContext) -> FinalReport {
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    for step in &bundle.steps {
        match ctx.step_result(&step.name).map(|e| e.status) {
            Some(StepStatus::Success) | Some(StepStatus::Partial) => succeeded += 1,
            Some(StepStatus::Failure) => failed += 1,
            Some(StepStatus::Skipped) => skipped += 1,
            None => {}
        }
    }
    let status = if failed > 0 { StepStatus::Failure } else { StepStatus::Success };
    FinalReport {
        bundle: bundle.name.clone(),
        status,
        step_count: bundle.steps.len(),
        succeeded,
        failed,
        skipped,
    }
}

/// Serialize-friendly echo of a bundle's declared inputs, used by callers
/// that want to show what a bundle expects before running it.
pub fn describe_inputs(bundle: &Bundle) -> serde_json::Value {
    json!(bundle
        .inputs
        .iter()
        .map(|(name, spec)| (name.clone(), json!({"required": spec.required, "default": spec.default})))
        .collect::<HashMap<_, _>>())
}
