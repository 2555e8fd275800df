//! Pure argv-assembly per tool family (spec §6.1): one function per variant,
//! covering the three representative shapes plus the fourth, simpler
//! Opencode-style family.
//!
//! Every builder returns a fully configured [`Command`] and never shells out
//! through a string — argv is always an explicit vector, per spec.

use std::path::Path;

use rcodegen_config::discover_script;
use rcodegen_core::error::CoreError;
use rcodegen_core::tool::ToolName;
use tokio::process::Command;

use crate::model::{validate_budget, validate_effort, validate_model};

/// Assembled command plus optional stdin payload (unused by any of the four
/// families today, kept so a future transport can plumb one through without
/// changing this function's shape).
pub struct Assembled {
    pub command: Command,
    pub stdin_data: Option<Vec<u8>>,
}

/// Validate `model`/`effort`/`budget_usd` and assemble the subprocess
/// command for `tool`. `session_id`, when present, is the provider session
/// previously captured for this tool (spec §4.7 step 2).
pub fn build_command(
    tool: ToolName,
    binary: &str,
    work_dir: &Path,
    prompt: &str,
    model: Option<&str>,
    effort: Option<&str>,
    budget_usd: Option<f64>,
    session_id: Option<&str>,
) -> Result<Assembled, CoreError> {
    validate_model(tool, model)?;
    validate_effort(effort)?;
    validate_budget(budget_usd)?;

    match tool {
        ToolName::ClaudeCode => Ok(claude_like(binary, work_dir, prompt, model, budget_usd, session_id)),
        ToolName::GeminiCli => Ok(gemini_like(binary, work_dir, prompt, model, session_id)),
        ToolName::Opencode => Ok(opencode_like(binary, work_dir, prompt, model, session_id)),
        ToolName::Codex => Ok(codex_like(binary, work_dir, prompt, model, effort, session_id)),
    }
}

/// Stream-JSON prompt tool (Claude-like), spec §6.1:
/// `<bin> --print all --output-format stream-json -p <prompt>
/// --dangerously-skip-permissions --model <m> --max-budget-usd <b>
/// [--resume <session_id>]`.
fn claude_like(
    binary: &str,
    work_dir: &Path,
    prompt: &str,
    model: Option<&str>,
    budget_usd: Option<f64>,
    session_id: Option<&str>,
) -> Assembled {
    let mut cmd = Command::new(binary);
    cmd.current_dir(work_dir);
    cmd.arg("--print").arg("all");
    cmd.arg("--output-format").arg("stream-json");
    cmd.arg("-p").arg(prompt);
    cmd.arg("--dangerously-skip-permissions");
    if let Some(m) = model {
        cmd.arg("--model").arg(m);
    }
    if let Some(b) = budget_usd {
        cmd.arg("--max-budget-usd").arg(format!("{b}"));
    }
    if let Some(s) = session_id {
        cmd.arg("--resume").arg(s);
    }
    Assembled { command: cmd, stdin_data: None }
}

/// Stream-JSON content tool (Gemini-like), spec §6.1:
/// `<bin> -p <prompt> --output-format stream-json --yolo [-m <model>]
/// [--resume <session_id>]`.
fn gemini_like(binary: &str, work_dir: &Path, prompt: &str, model: Option<&str>, session_id: Option<&str>) -> Assembled {
    let mut cmd = Command::new(binary);
    cmd.current_dir(work_dir);
    cmd.arg("-p").arg(prompt);
    cmd.arg("--output-format").arg("stream-json");
    cmd.arg("--yolo");
    if let Some(m) = model {
        cmd.arg("-m").arg(m);
    }
    if let Some(s) = session_id {
        cmd.arg("--resume").arg(s);
    }
    Assembled { command: cmd, stdin_data: None }
}

/// The fourth, simpler argv-only family (Opencode), kept because the
/// template already implements it — see SPEC_FULL.md §4.7/§6.1.
fn opencode_like(binary: &str, work_dir: &Path, prompt: &str, model: Option<&str>, session_id: Option<&str>) -> Assembled {
    let mut cmd = Command::new(binary);
    cmd.current_dir(work_dir);
    cmd.arg("run").arg("--format").arg("json");
    if let Some(m) = model {
        cmd.arg("-m").arg(m);
    }
    if let Some(s) = session_id {
        cmd.arg("-s").arg(s);
    }
    cmd.arg(prompt);
    Assembled { command: cmd, stdin_data: None }
}

/// Exec-based tool (Codex-like), spec §6.1: `<bin> exec
/// --dangerously-bypass-approvals-and-sandbox --model <m> -c
/// model_reasoning_effort=<effort> -C <work_dir> <prompt>`. Resume goes
/// through a PTY-wrapper script discovered only from trusted locations
/// (`rcodegen_config::discover_script`, never the current working
/// directory); a missing wrapper degrades gracefully to a fresh (unresumed)
/// invocation rather than failing the step.
fn codex_like(
    binary: &str,
    work_dir: &Path,
    prompt: &str,
    model: Option<&str>,
    effort: Option<&str>,
    session_id: Option<&str>,
) -> Assembled {
    if let Some(session_id) = session_id {
        if let Some(wrapper) = discover_script("codex_resume.py") {
            let mut cmd = Command::new("python3");
            cmd.current_dir(work_dir);
            cmd.arg(&wrapper);
            cmd.arg(session_id);
            cmd.arg(prompt);
            if let Some(m) = model {
                cmd.arg("--model").arg(m);
            }
            if let Some(e) = effort {
                cmd.arg("-c").arg(format!("model_reasoning_effort={e}"));
            }
            return Assembled { command: cmd, stdin_data: None };
        }
        tracing::warn!(
            "codex resume requested but no trusted PTY-wrapper script found; falling back to a fresh invocation"
        );
    }

    let mut cmd = Command::new(binary);
    cmd.current_dir(work_dir);
    cmd.arg("exec");
    cmd.arg("--dangerously-bypass-approvals-and-sandbox");
    if let Some(m) = model {
        cmd.arg("--model").arg(m);
    }
    if let Some(e) = effort {
        cmd.arg("-c").arg(format!("model_reasoning_effort={e}"));
    }
    cmd.arg("-C").arg(work_dir);
    cmd.arg(prompt);
    Assembled { command: cmd, stdin_data: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn claude_like_includes_stream_json_and_skip_permissions() {
        let assembled = build_command(
            ToolName::ClaudeCode,
            "claude",
            &PathBuf::from("/work"),
            "do the thing",
            Some("opus"),
            None,
            Some(2.5),
            None,
        )
        .unwrap();
        let args = args_of(&assembled.command);
        assert!(args.contains(&"--output-format".to_string()));
        assert!(args.contains(&"stream-json".to_string()));
        assert!(args.contains(&"--dangerously-skip-permissions".to_string()));
        assert!(args.contains(&"--model".to_string()));
        assert!(args.contains(&"opus".to_string()));
        assert!(args.contains(&"--max-budget-usd".to_string()));
        assert!(!args.contains(&"--resume".to_string()));
    }

    #[test]
    fn claude_like_resumes_when_session_present() {
        let assembled = build_command(
            ToolName::ClaudeCode,
            "claude",
            &PathBuf::from("/work"),
            "p",
            None,
            None,
            None,
            Some("sess-1"),
        )
        .unwrap();
        let args = args_of(&assembled.command);
        assert!(args.contains(&"--resume".to_string()));
        assert!(args.contains(&"sess-1".to_string()));
    }

    #[test]
    fn gemini_like_uses_yolo_flag() {
        let assembled = build_command(
            ToolName::GeminiCli,
            "gemini",
            &PathBuf::from("/work"),
            "p",
            Some("gemini-2.5-pro"),
            None,
            None,
            None,
        )
        .unwrap();
        let args = args_of(&assembled.command);
        assert!(args.contains(&"--yolo".to_string()));
        assert!(args.contains(&"-m".to_string()));
    }

    #[test]
    fn opencode_like_is_argv_only_and_simpler() {
        let assembled = build_command(
            ToolName::Opencode,
            "opencode",
            &PathBuf::from("/work"),
            "p",
            None,
            None,
            None,
            Some("sess-2"),
        )
        .unwrap();
        let args = args_of(&assembled.command);
        assert_eq!(args[0], "run");
        assert!(args.contains(&"-s".to_string()));
        assert!(args.contains(&"sess-2".to_string()));
    }

    #[test]
    fn codex_like_passes_work_dir_and_effort() {
        let assembled = build_command(
            ToolName::Codex,
            "codex",
            &PathBuf::from("/work"),
            "p",
            Some("gpt-5"),
            Some("high"),
            None,
            None,
        )
        .unwrap();
        let args = args_of(&assembled.command);
        assert!(args.contains(&"--dangerously-bypass-approvals-and-sandbox".to_string()));
        assert!(args.contains(&"-C".to_string()));
        assert!(args.contains(&"model_reasoning_effort=high".to_string()));
    }

    #[test]
    fn codex_resume_without_a_trusted_wrapper_falls_back_to_fresh_exec() {
        // No wrapper script exists in this test environment, so resume must
        // degrade to a normal `exec` invocation rather than failing.
        let assembled = build_command(
            ToolName::Codex,
            "codex",
            &PathBuf::from("/work"),
            "p",
            None,
            None,
            None,
            Some("sess-3"),
        )
        .unwrap();
        let program = assembled.command.as_std().get_program().to_string_lossy().to_string();
        assert_eq!(program, "codex");
    }

    #[test]
    fn unknown_model_is_rejected_before_argv_assembly() {
        let result = build_command(
            ToolName::ClaudeCode,
            "claude",
            &PathBuf::from("/work"),
            "p",
            Some("not-a-real-model"),
            None,
            None,
            None,
        );
        assert!(matches!(result, Err(CoreError::InvalidModel(..))));
    }
}
