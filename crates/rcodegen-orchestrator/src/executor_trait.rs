//! The factory/registry seam between the orchestrator and the tool executor
//! layer (spec §9 "Factory wiring"): the orchestrator dispatches `tool`
//! steps through this trait and never imports the executor crate directly,
//! so `rcodegen-executor` can depend on `rcodegen-orchestrator` (for `Step`
//! and this trait) without creating an import cycle. The composition root
//! (`rcodegen-task`/`rcodegen-cli`) is the only place that depends on both
//! crates and wires a registry together.

use std::collections::HashMap;
use std::sync::Arc;

use rcodegen_core::{CancelToken, Envelope};
use rcodegen_context::ResolutionContext;
use rcodegen_workspace::Workspace;

use crate::step::Step;

/// Executes a single `tool`-shaped step. Implemented by the tool executor
/// crate; the orchestrator only ever calls through this trait object.
#[async_trait::async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: &Step,
        ctx: &ResolutionContext,
        workspace: &Workspace,
        cancel: &CancelToken,
    ) -> Envelope;
}

/// Maps a step's `tool` name to the [`StepExecutor`] that handles it.
/// Populated by the caller at startup, not by the orchestrator itself.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool_name: impl Into<String>, executor: Arc<dyn StepExecutor>) -> &mut Self {
        self.executors.insert(tool_name.into(), executor);
        self
    }

    pub fn get(&self, tool_name: &str) -> Option<&Arc<dyn StepExecutor>> {
        self.executors.get(tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysSuccess;

    #[async_trait::async_trait]
    impl StepExecutor for AlwaysSuccess {
        async fn execute(&self, _: &Step, _: &ResolutionContext, _: &Workspace, _: &CancelToken) -> Envelope {
            Envelope::success()
        }
    }

    #[tokio::test]
    async fn registry_round_trips_an_executor() {
        let mut registry = ExecutorRegistry::new();
        registry.register("claude-code", Arc::new(AlwaysSuccess));
        assert!(registry.get("claude-code").is_some());
        assert!(registry.get("codex").is_none());

        let ctx = ResolutionContext::new(HashMap::new());
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let cancel = CancelToken::new();
        let step = Step {
            name: "s".into(),
            tool: Some("claude-code".into()),
            ..Default::default()
        };
        let env = registry.get("claude-code").unwrap().execute(&step, &ctx, &ws, &cancel).await;
        assert!(env.is_success());
    }
}
