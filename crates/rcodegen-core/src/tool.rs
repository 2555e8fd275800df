//! The closed set of external AI CLIs this engine knows how to drive.
//!
//! Modeled as a fixed enum rather than a trait object: a small, closed set
//! of tool shapes is better served by exhaustive `match`es than by dynamic
//! dispatch through a registry nobody else will ever populate.

use serde::{Deserialize, Serialize};

/// AI tool selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolName {
    ClaudeCode,
    Codex,
    GeminiCli,
    Opencode,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude-code",
            Self::Codex => "codex",
            Self::GeminiCli => "gemini-cli",
            Self::Opencode => "opencode",
        }
    }

    /// The usage/cost-extraction family this tool belongs to (spec §4.7.1).
    pub fn family(&self) -> ToolFamily {
        match self {
            Self::ClaudeCode => ToolFamily::StreamJsonPrompt,
            Self::GeminiCli => ToolFamily::StreamJsonContent,
            Self::Codex => ToolFamily::ExecRegex,
            Self::Opencode => ToolFamily::StreamJsonPrompt,
        }
    }
}

impl std::str::FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude-code" => Ok(Self::ClaudeCode),
            "codex" => Ok(Self::Codex),
            "gemini-cli" => Ok(Self::GeminiCli),
            "opencode" => Ok(Self::Opencode),
            other => Err(format!(
                "unknown tool '{other}'. Valid values: claude-code, codex, gemini-cli, opencode"
            )),
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Usage/cost extraction family, per spec §4.7.1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolFamily {
    /// Stream-JSON prompt tool (Claude-like): `result` event carries
    /// `total_cost_usd` and a full usage breakdown.
    StreamJsonPrompt,
    /// Stream-JSON content tool (Gemini-like): `stats.{input_tokens,
    /// output_tokens, cached}`; cost computed from configured pricing.
    StreamJsonContent,
    /// Exec-based tool with no per-field breakdown (Codex-like): total
    /// token count parsed from stderr via regex, split at a named ratio.
    ExecRegex,
}
