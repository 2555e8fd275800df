//! Per-tool model allowlists and the effort/budget validation every adapter
//! runs before argv assembly (spec §6.1: "unknown models → `INVALID_MODEL`
//! error"), one enumerated list per [`ToolName`] rather than a single
//! free-form `tool/provider/model/thinking_budget` string.

use rcodegen_core::error::CoreError;
use rcodegen_core::tool::ToolName;

const CLAUDE_CODE_MODELS: &[&str] = &["opus", "sonnet", "haiku"];
const CODEX_MODELS: &[&str] = &["gpt-5", "gpt-5-mini", "o3"];
const GEMINI_CLI_MODELS: &[&str] = &["gemini-2.5-pro", "gemini-2.5-flash"];
const OPENCODE_MODELS: &[&str] = &["gpt-5", "claude-sonnet-4", "gemini-2.5-pro"];

const VALID_EFFORTS: &[&str] = &["low", "medium", "high"];

/// The enumerated model names a tool accepts.
pub fn valid_models(tool: ToolName) -> &'static [&'static str] {
    match tool {
        ToolName::ClaudeCode => CLAUDE_CODE_MODELS,
        ToolName::Codex => CODEX_MODELS,
        ToolName::GeminiCli => GEMINI_CLI_MODELS,
        ToolName::Opencode => OPENCODE_MODELS,
    }
}

/// `None` (use the tool's own default) always validates. `Some(name)` must
/// appear in [`valid_models`].
pub fn validate_model(tool: ToolName, model: Option<&str>) -> Result<(), CoreError> {
    match model {
        None => Ok(()),
        Some(name) if valid_models(tool).contains(&name) => Ok(()),
        Some(name) => Err(CoreError::InvalidModel(name.to_string(), tool.as_str().to_string())),
    }
}

/// `None` always validates; `Some` must be one of `low`/`medium`/`high`.
pub fn validate_effort(effort: Option<&str>) -> Result<(), CoreError> {
    match effort {
        None => Ok(()),
        Some(e) if VALID_EFFORTS.contains(&e) => Ok(()),
        Some(e) => Err(CoreError::InvalidEffort(e.to_string())),
    }
}

/// `None` always validates; `Some` must be a finite positive amount.
pub fn validate_budget(budget_usd: Option<f64>) -> Result<(), CoreError> {
    match budget_usd {
        None => Ok(()),
        Some(b) if b.is_finite() && b > 0.0 => Ok(()),
        Some(b) => Err(CoreError::InvalidBudget(b.to_string())),
    }
}
