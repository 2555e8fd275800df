//! Session ID extraction from tool output (spec §4.7 step 5): stream-JSON
//! tools carry `session_id` as a JSON field in stdout; the PTY-wrapper tool
//! (Codex) instead prints it to stderr, extracted with a regex. Returns
//! `None` on any extraction failure — graceful degradation, never an error.

use regex::Regex;
use rcodegen_core::tool::ToolName;

/// Extract the provider-native session id for `tool` from its captured
/// stdout/stderr.
pub fn extract_session_id(tool: ToolName, stdout: &str, stderr: &str) -> Option<String> {
    match tool {
        ToolName::Codex => extract_from_stderr(stderr),
        ToolName::ClaudeCode | ToolName::GeminiCli | ToolName::Opencode => extract_from_stdout_json(stdout),
    }
}

/// Scan stdout for the first JSON object carrying a `session_id` field.
fn extract_from_stdout_json(stdout: &str) -> Option<String> {
    let pattern = Regex::new(r#""session_id"\s*:\s*"([^"]+)""#).ok()?;
    pattern.captures(stdout).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// PTY-wrapper tools print `session id: <id>` to stderr rather than JSON.
fn extract_from_stderr(stderr: &str) -> Option<String> {
    let pattern = Regex::new(r"(?i)session id:\s*(\S+)").ok()?;
    pattern.captures(stderr).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}
