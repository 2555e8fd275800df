//! The step-shape dispatcher (C9) and the parallel/merge/vote executors
//! (C8). `dispatch_step` is a pure routing function over a closed enum
//! resolved once per step; parallel substeps are spawned with a `JoinSet`,
//! one task per substep, joined before aggregating.
//!
//! The context/workspace/registry are threaded through as `Arc` rather than
//! borrows: `JoinSet::spawn` requires `'static` futures, so the parallel
//! executor needs owned handles to share across tasks, and it's simplest to
//! keep every call site — sequential or parallel — taking the same
//! `Arc`-shaped arguments rather than maintaining two signatures.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rcodegen_core::error::CoreError;
use rcodegen_core::{CancelToken, Envelope};
use rcodegen_context::ResolutionContext;
use rcodegen_workspace::Workspace;
use serde_json::json;
use tokio::task::JoinSet;

use crate::executor_trait::ExecutorRegistry;
use crate::step::{MergeStrategy, Step, StepShape, VoteStrategy};

const MERGE_DELIMITER: &str = "\n\n---\n\n";

/// Route `step` to the executor its shape implies, recursing into
/// `dispatch_step` for parallel substeps. Boxed because it's recursive:
/// async fns can't directly call themselves without indirection.
pub fn dispatch_step(
    step: Step,
    ctx: Arc<ResolutionContext>,
    workspace: Arc<Workspace>,
    registry: Arc<ExecutorRegistry>,
    cancel: CancelToken,
) -> Pin<Box<dyn Future<Output = Envelope> + Send>> {
    Box::pin(async move {
        match step.shape() {
            StepShape::Tool => dispatch_tool(&step, &ctx, &workspace, &registry, &cancel).await,
            StepShape::Parallel => dispatch_parallel(step, ctx, workspace, registry, cancel).await,
            StepShape::Merge => dispatch_merge(&step, &ctx, &workspace),
            StepShape::Vote => dispatch_vote(&step, &ctx, &workspace),
            StepShape::Conditional | StepShape::Unknown => {
                CoreError::UnknownStep(step.name.clone()).into_failure_envelope()
            }
        }
    })
}

async fn dispatch_tool(
    step: &Step,
    ctx: &ResolutionContext,
    workspace: &Workspace,
    registry: &ExecutorRegistry,
    cancel: &CancelToken,
) -> Envelope {
    let Some(tool_name) = step.tool.as_deref() else {
        return CoreError::UnknownStep(step.name.clone()).into_failure_envelope();
    };
    match registry.get(tool_name) {
        Some(executor) => executor.execute(step, ctx, workspace, cancel).await,
        None => CoreError::UnknownStep(format!("{}: tool '{tool_name}' not registered", step.name))
            .into_failure_envelope(),
    }
}

/// Parallel (C8): execute every substep concurrently, wait for all, then
/// aggregate. No early abort on first failure — a failing substep becomes
/// part of the `partial`/`failure` aggregate, never short-circuits the others.
async fn dispatch_parallel(
    step: Step,
    ctx: Arc<ResolutionContext>,
    workspace: Arc<Workspace>,
    registry: Arc<ExecutorRegistry>,
    cancel: CancelToken,
) -> Envelope {
    let substeps = step.parallel.unwrap_or_default();

    let mut join_set = JoinSet::new();
    for substep in substeps {
        let ctx = Arc::clone(&ctx);
        let workspace = Arc::clone(&workspace);
        let registry = Arc::clone(&registry);
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let name = substep.name.clone();
            let envelope = dispatch_step(substep, ctx, workspace, registry, cancel).await;
            (name, envelope)
        });
    }

    let mut envelopes = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((name, envelope)) => {
                ctx.record_step_result(&name, envelope.clone());
                envelopes.push(envelope);
            }
            Err(e) => {
                tracing::error!(error = %e, "parallel substep task panicked");
            }
        }
    }

    aggregate_parallel(&envelopes)
}

fn aggregate_parallel(envelopes: &[Envelope]) -> Envelope {
    let total = envelopes.len();
    let succeeded = envelopes.iter().filter(|e| e.is_success()).count();
    let failed = envelopes.iter().filter(|e| e.is_failure()).count();

    let status = if total == 0 || succeeded == total {
        rcodegen_core::StepStatus::Success
    } else if failed == total {
        rcodegen_core::StepStatus::Failure
    } else {
        rcodegen_core::StepStatus::Partial
    };

    let cost_usd: f64 = envelopes.iter().map(|e| e.result_f64("cost_usd")).sum();
    let input_tokens: f64 = envelopes.iter().map(|e| e.result_f64("input_tokens")).sum();
    let output_tokens: f64 = envelopes.iter().map(|e| e.result_f64("output_tokens")).sum();

    let env = match status {
        rcodegen_core::StepStatus::Failure => {
            Envelope::failure("EXIT_1", "all parallel substeps failed")
        }
        rcodegen_core::StepStatus::Partial => Envelope::partial(),
        _ => Envelope::success(),
    };

    env.with_result("steps", total as i64)
        .with_result("cost_usd", cost_usd)
        .with_result("input_tokens", input_tokens)
        .with_result("output_tokens", output_tokens)
}

/// Merge (C8): resolve each input reference through the context (which may
/// trigger a file read for `${steps.x.stdout}`-shaped references), read the
/// referenced file, and combine per `strategy`.
fn dispatch_merge(step: &Step, ctx: &ResolutionContext, workspace: &Workspace) -> Envelope {
    let Some(merge) = &step.merge else {
        return CoreError::UnknownStep(step.name.clone()).into_failure_envelope();
    };

    let mut contents: Vec<String> = Vec::new();
    let mut failed_inputs: Vec<String> = Vec::new();

    for input in &merge.inputs {
        let resolved_path = ctx.substitute(input);
        match std::fs::read_to_string(&resolved_path) {
            Ok(text) => contents.push(text),
            Err(_) => failed_inputs.push(input.clone()),
        }
    }

    if merge.strategy == MergeStrategy::Union || merge.strategy == MergeStrategy::Dedupe {
        let mut seen = HashSet::new();
        contents.retain(|entry| seen.insert(entry.clone()));
    }

    let merged = contents.join(MERGE_DELIMITER);
    let input_count = contents.len();

    let payload = json!({
        "merged": merged,
        "input_count": input_count,
        "failed_inputs": failed_inputs,
    });

    let output_ref = match workspace.write_output(&step.name, &payload) {
        Ok(path) => path,
        Err(e) => return CoreError::OutputWriteError(e.to_string()).into_failure_envelope(),
    };

    if input_count == 0 && !merge.inputs.is_empty() {
        // The workspace write above succeeded (we have `output_ref`); the
        // failure here is that every merge *input* was unreadable, distinct
        // from a workspace write failure (`OUTPUT_WRITE_ERROR` is reserved
        // for that, per spec §7).
        Envelope::failure("EXIT_1", "no merge input could be read")
            .with_output_ref(&output_ref)
            .with_result("input_count", input_count as i64)
    } else if !failed_inputs.is_empty() {
        Envelope::partial()
            .with_output_ref(&output_ref)
            .with_result("input_count", input_count as i64)
    } else {
        Envelope::success()
            .with_output_ref(&output_ref)
            .with_result("input_count", input_count as i64)
    }
}

/// Vote (C8): tally `success` vs not-success across the referenced steps'
/// envelopes, looked up through the context (a read-lock access per lookup,
/// never held across the whole tally).
fn dispatch_vote(step: &Step, ctx: &ResolutionContext, workspace: &Workspace) -> Envelope {
    let Some(vote) = &step.vote else {
        return CoreError::UnknownStep(step.name.clone()).into_failure_envelope();
    };

    let mut success = 0i64;
    let mut failure = 0i64;
    for input in &vote.inputs {
        let referenced_name = extract_step_name(input);
        let is_success = ctx
            .step_result(&referenced_name)
            .map(|e| e.is_success())
            .unwrap_or(false);
        if is_success {
            success += 1;
        } else {
            failure += 1;
        }
    }

    let total = success + failure;
    let decision = match vote.strategy {
        VoteStrategy::Majority => {
            if total > 0 && (success as f64) > (total as f64) / 2.0 {
                "approved"
            } else {
                "rejected"
            }
        }
        VoteStrategy::Unanimous => {
            if total > 0 && success == total {
                "approved"
            } else {
                "rejected"
            }
        }
    };

    let payload = json!({
        "votes": {"success": success, "failure": failure},
        "decision": decision,
    });

    let output_ref = match workspace.write_output(&step.name, &payload) {
        Ok(path) => path,
        Err(e) => return CoreError::OutputWriteError(e.to_string()).into_failure_envelope(),
    };

    Envelope::success()
        .with_output_ref(&output_ref)
        .with_result("votes", json!({"success": success, "failure": failure}))
        .with_result("decision", decision)
}

/// Extract the step name between `${steps.` and the next `.` or `}`. An
/// opaque reference with no such marker yields `""` (never matches a real
/// step, tallies as not-success).
fn extract_step_name(reference: &str) -> String {
    const MARKER: &str = "${steps.";
    let Some(start) = reference.find(MARKER).map(|i| i + MARKER.len()) else {
        return String::new();
    };
    let rest = &reference[start..];
    let end = rest.find(['.', '}']).unwrap_or(rest.len());
    rest[..end].to_string()
}
