//! Line-oriented streaming event classifier (spec §4.7.2): classifies each
//! captured line into a typed event for the live-display interface (§6.2).
//! Irrelevant to envelope correctness — usage/cost and session id are
//! extracted separately from the full captured text — but required for the display
//! contract, so a step's worth of events can be rendered as they occur.

use serde_json::Value;

const HINT_MAX_LEN: usize = 60;

/// One classified line of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// `system.init`, de-duplicated: only the first occurrence is kept.
    SystemInit,
    /// `assistant.message.content[].type = "text"`, forwarded verbatim.
    Text(String),
    /// `assistant.message.content[].type = "tool_use"`, reduced to a terse
    /// per-tool hint (e.g. a file path, or a truncated command).
    ToolUse { name: String, hint: String },
    /// `tool_result`, reduced to a one-line summary placeholder.
    ToolResult(String),
    /// `result`: the final cost/usage/error summary.
    Result { cost_usd: f64, input_tokens: u64, output_tokens: u64, is_error: bool },
    /// A line that wasn't JSON at all, forwarded as-is.
    Raw(String),
}

/// Classify every line of `stdout` into zero or more events. Unknown JSON
/// event types are dropped silently; non-JSON lines always survive as
/// [`StreamEvent::Raw`]; `system.init` is emitted at most once.
pub fn classify_stream(stdout: &str) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut seen_system_init = false;
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => classify_json_line(&value, &mut seen_system_init, &mut events),
            Err(_) => events.push(StreamEvent::Raw(line.to_string())),
        }
    }
    events
}

fn classify_json_line(value: &Value, seen_system_init: &mut bool, out: &mut Vec<StreamEvent>) {
    let Some(ty) = value.get("type").and_then(Value::as_str) else { return };
    match ty {
        "system" => {
            if value.get("subtype").and_then(Value::as_str) == Some("init") && !*seen_system_init {
                *seen_system_init = true;
                out.push(StreamEvent::SystemInit);
            }
        }
        "assistant" => classify_assistant_message(value, out),
        "tool_result" => out.push(StreamEvent::ToolResult(summarize_tool_result(value))),
        "result" => out.push(classify_result(value)),
        _ => {}
    }
}

fn classify_assistant_message(value: &Value, out: &mut Vec<StreamEvent>) {
    let Some(content) = value.pointer("/message/content").and_then(Value::as_array) else { return };
    for item in content {
        match item.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    out.push(StreamEvent::Text(text.to_string()));
                }
            }
            Some("tool_use") => {
                let name = item.get("name").and_then(Value::as_str).unwrap_or("unknown").to_string();
                let hint = tool_use_hint(&name, item.get("input"));
                out.push(StreamEvent::ToolUse { name, hint });
            }
            _ => {}
        }
    }
}

/// Derive a terse hint for a `tool_use` block using a fixed per-tool rule.
fn tool_use_hint(name: &str, input: Option<&Value>) -> String {
    match name {
        "Read" | "Write" | "Edit" => input
            .and_then(|i| i.get("file_path"))
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string(),
        "Bash" => {
            let command = input.and_then(|i| i.get("command")).and_then(Value::as_str).unwrap_or("?");
            truncate(command, HINT_MAX_LEN)
        }
        "Glob" | "Grep" => input
            .and_then(|i| i.get("pattern"))
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string(),
        "Task" => input.and_then(|i| i.get("description")).and_then(Value::as_str).unwrap_or("?").to_string(),
        "TodoWrite" => "updated todo list".to_string(),
        _ => name.to_string(),
    }
}

fn summarize_tool_result(value: &Value) -> String {
    match value.get("content").and_then(Value::as_str) {
        Some(text) => truncate(text, HINT_MAX_LEN),
        None => "(tool result)".to_string(),
    }
}

fn classify_result(value: &Value) -> StreamEvent {
    let cost_usd = value.get("total_cost_usd").and_then(Value::as_f64).unwrap_or(0.0);
    let usage = value.get("usage");
    let input_tokens = usage.and_then(|u| u.get("input_tokens")).and_then(Value::as_u64).unwrap_or(0);
    let output_tokens = usage.and_then(|u| u.get("output_tokens")).and_then(Value::as_u64).unwrap_or(0);
    let is_error = value.get("is_error").and_then(Value::as_bool).unwrap_or(false);
    StreamEvent::Result { cost_usd, input_tokens, output_tokens, is_error }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_init_is_deduplicated() {
        let stdout = concat!(
            r#"{"type":"system","subtype":"init"}"#, "\n",
            r#"{"type":"system","subtype":"init"}"#, "\n",
        );
        let events = classify_stream(stdout);
        assert_eq!(events, vec![StreamEvent::SystemInit]);
    }

    #[test]
    fn text_content_is_forwarded_verbatim() {
        let stdout = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello there"}]}}"#;
        let events = classify_stream(stdout);
        assert_eq!(events, vec![StreamEvent::Text("hello there".to_string())]);
    }

    #[test]
    fn tool_use_read_hints_the_file_path() {
        let stdout = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read","input":{"file_path":"/a/b.rs"}}]}}"#;
        let events = classify_stream(stdout);
        assert_eq!(
            events,
            vec![StreamEvent::ToolUse { name: "Read".to_string(), hint: "/a/b.rs".to_string() }]
        );
    }

    #[test]
    fn tool_use_bash_truncates_long_commands() {
        let long_command = "a".repeat(100);
        let stdout = format!(
            r#"{{"type":"assistant","message":{{"content":[{{"type":"tool_use","name":"Bash","input":{{"command":"{long_command}"}}}}]}}}}"#
        );
        let events = classify_stream(&stdout);
        let StreamEvent::ToolUse { hint, .. } = &events[0] else { panic!("expected ToolUse") };
        assert!(hint.chars().count() <= HINT_MAX_LEN + 1);
    }

    #[test]
    fn result_event_captures_cost_and_error_flag() {
        let stdout = r#"{"type":"result","total_cost_usd":1.5,"is_error":true,"usage":{"input_tokens":3,"output_tokens":4}}"#;
        let events = classify_stream(stdout);
        assert_eq!(
            events,
            vec![StreamEvent::Result { cost_usd: 1.5, input_tokens: 3, output_tokens: 4, is_error: true }]
        );
    }

    #[test]
    fn unknown_type_is_dropped_silently() {
        let stdout = r#"{"type":"something_new","whatever":1}"#;
        assert_eq!(classify_stream(stdout), vec![]);
    }

    #[test]
    fn non_json_lines_are_forwarded_raw() {
        let stdout = "plain log line\nanother one";
        let events = classify_stream(stdout);
        assert_eq!(
            events,
            vec![
                StreamEvent::Raw("plain log line".to_string()),
                StreamEvent::Raw("another one".to_string()),
            ]
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        let stdout = "\n\n  \n";
        assert_eq!(classify_stream(stdout), vec![]);
    }
}
