//! The tool executor (C7): adapters, usage extraction, session-id
//! extraction, and the streaming event classifier. Implements
//! `rcodegen_orchestrator::StepExecutor` so the orchestrator never depends
//! on this crate directly (spec §9 "Factory wiring") — only the composition
//! root wires a populated registry together via [`register_default_executors`].

pub mod adapter;
pub mod model;
pub mod session;
pub mod stream;
pub mod tool_executor;
pub mod usage;

pub use stream::{classify_stream, StreamEvent};
pub use tool_executor::ToolExecutor;
pub use usage::{extract_usage, UsageResult};

use std::sync::Arc;

use rcodegen_config::RuntimeConfig;
use rcodegen_core::tool::ToolName;
use rcodegen_orchestrator::ExecutorRegistry;

/// Build and register a [`ToolExecutor`] for each of the four tools, keyed
/// by [`ToolName::as_str`], using the binary names and pricing from `config`.
pub fn register_default_executors(registry: &mut ExecutorRegistry, config: &RuntimeConfig) {
    let tools = [
        (ToolName::ClaudeCode, config.tool_binaries.claude_code.clone()),
        (ToolName::Codex, config.tool_binaries.codex.clone()),
        (ToolName::GeminiCli, config.tool_binaries.gemini_cli.clone()),
        (ToolName::Opencode, config.tool_binaries.opencode.clone()),
    ];
    for (tool, binary) in tools {
        let executor = ToolExecutor::new(tool, binary, config.pricing);
        registry.register(tool.as_str(), Arc::new(executor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_one_executor_per_tool() {
        let mut registry = ExecutorRegistry::new();
        register_default_executors(&mut registry, &RuntimeConfig::default());
        for tool in [ToolName::ClaudeCode, ToolName::Codex, ToolName::GeminiCli, ToolName::Opencode] {
            assert!(registry.get(tool.as_str()).is_some());
        }
    }
}
