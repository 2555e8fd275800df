//! The shared resolution context (C6): immutable `inputs`, mutable
//! `step_results`, mutable `tool_sessions`, all under one reader/writer
//! lock. Variable substitution never holds that lock across file I/O: it
//! collects `(placeholder span, path, field)` triples under a read lock,
//! releases it, reads files, then splices the results back into the string.

use std::collections::HashMap;
use std::sync::RwLock;

use rcodegen_core::envelope::Envelope;

use crate::substitute::{Placeholder, extract_output_field, find_placeholders, parse_placeholder, value_to_display_string};

struct Inner {
    inputs: HashMap<String, String>,
    step_results: HashMap<String, Envelope>,
    tool_sessions: HashMap<String, String>,
}

pub struct ResolutionContext {
    inner: RwLock<Inner>,
}

/// A placeholder that needs a file read, deferred until after the lock on
/// `Inner` is released.
struct PendingFileRead {
    start: usize,
    end: usize,
    output_path: std::path::PathBuf,
    field: &'static str,
}

enum Resolved {
    /// Fully resolved within the read lock.
    Value(String),
    /// Needs a file read outside the lock.
    Pending(PendingFileRead),
    /// Could not be resolved; leave the original text in place.
    Unresolved,
}

impl ResolutionContext {
    pub fn new(inputs: HashMap<String, String>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                inputs,
                step_results: HashMap::new(),
                tool_sessions: HashMap::new(),
            }),
        }
    }

    pub fn input(&self, name: &str) -> Option<String> {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).inputs.get(name).cloned()
    }

    pub fn record_step_result(&self, name: &str, envelope: Envelope) {
        self.inner
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .step_results
            .insert(name.to_string(), envelope);
    }

    pub fn step_result(&self, name: &str) -> Option<Envelope> {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).step_results.get(name).cloned()
    }

    pub fn tool_session(&self, tool: &str) -> Option<String> {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).tool_sessions.get(tool).cloned()
    }

    pub fn set_tool_session(&self, tool: &str, session_id: impl Into<String>) {
        self.inner
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .tool_sessions
            .insert(tool.to_string(), session_id.into());
    }

    /// Substitute every `${...}` placeholder in `template`. Unresolved
    /// placeholders (unknown input/step name, unrecognized field, missing
    /// output file) are left literally intact rather than erroring.
    pub fn substitute(&self, template: &str) -> String {
        let placeholders = find_placeholders(template);
        if placeholders.is_empty() {
            return template.to_string();
        }

        let mut resolutions: Vec<Resolved> = Vec::with_capacity(placeholders.len());
        {
            let guard = self.inner.read().unwrap_or_else(|p| p.into_inner());
            for (start, end, inner) in &placeholders {
                resolutions.push(self.resolve_within_lock(&guard, *start, *end, inner));
            }
        }

        let mut rendered: Vec<Option<String>> = Vec::with_capacity(resolutions.len());
        for resolved in resolutions {
            match resolved {
                Resolved::Value(v) => rendered.push(Some(v)),
                Resolved::Unresolved => rendered.push(None),
                Resolved::Pending(pending) => {
                    let value = std::fs::read_to_string(&pending.output_path)
                        .ok()
                        .and_then(|raw| extract_output_field(&raw, pending.field));
                    rendered.push(value);
                }
            }
        }

        let mut out = String::with_capacity(template.len());
        let mut cursor = 0usize;
        for ((start, end, _), value) in placeholders.iter().zip(rendered.iter()) {
            out.push_str(&template[cursor..*start]);
            match value {
                Some(v) => out.push_str(v),
                None => out.push_str(&template[*start..*end]),
            }
            cursor = *end;
        }
        out.push_str(&template[cursor..]);
        out
    }

    fn resolve_within_lock(&self, guard: &Inner, start: usize, end: usize, inner: &str) -> Resolved {
        let Some(placeholder) = parse_placeholder(inner) else {
            return Resolved::Unresolved;
        };

        match placeholder {
            Placeholder::Input(name) => match guard.inputs.get(&name) {
                Some(v) => Resolved::Value(v.clone()),
                None => Resolved::Unresolved,
            },
            Placeholder::StepStatus(step) => match guard.step_results.get(&step) {
                Some(env) => Resolved::Value(env.status.as_str().to_string()),
                None => Resolved::Unresolved,
            },
            Placeholder::StepOutputRef(step) => match guard.step_results.get(&step).and_then(|e| e.output_ref.clone()) {
                Some(path) => Resolved::Value(path.display().to_string()),
                None => Resolved::Unresolved,
            },
            Placeholder::StepResult(step) => match guard.step_results.get(&step) {
                Some(env) => Resolved::Value(serde_json::to_string(&env.result).unwrap_or_default()),
                None => Resolved::Unresolved,
            },
            Placeholder::StepResultField(step, field) => {
                match guard.step_results.get(&step).and_then(|e| e.result.get(&field)) {
                    Some(v) => Resolved::Value(value_to_display_string(v)),
                    None => Resolved::Unresolved,
                }
            }
            Placeholder::StepStdout(step) => self.pending_for(guard, &step, "stdout", start, end),
            Placeholder::StepStderr(step) => self.pending_for(guard, &step, "stderr", start, end),
        }
    }

    fn pending_for(&self, guard: &Inner, step: &str, field: &'static str, start: usize, end: usize) -> Resolved {
        match guard.step_results.get(step).and_then(|e| e.output_ref.clone()) {
            Some(output_path) => Resolved::Pending(PendingFileRead {
                start,
                end,
                output_path,
                field,
            }),
            None => Resolved::Unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcodegen_core::envelope::Envelope;
    use std::fs;
    use tempfile::tempdir;

    fn ctx_with_input(name: &str, value: &str) -> ResolutionContext {
        let mut inputs = HashMap::new();
        inputs.insert(name.to_string(), value.to_string());
        ResolutionContext::new(inputs)
    }

    #[test]
    fn substitutes_input_value() {
        let ctx = ctx_with_input("codebase", "my-repo");
        assert_eq!(ctx.substitute("build ${inputs.codebase}"), "build my-repo");
    }

    #[test]
    fn unknown_placeholder_left_literal() {
        let ctx = ResolutionContext::new(HashMap::new());
        assert_eq!(ctx.substitute("${inputs.missing}"), "${inputs.missing}");
    }

    #[test]
    fn idempotent_with_no_placeholders() {
        let ctx = ResolutionContext::new(HashMap::new());
        assert_eq!(ctx.substitute("plain string"), "plain string");
    }

    #[test]
    fn substitutes_step_status_and_output_ref() {
        let ctx = ResolutionContext::new(HashMap::new());
        let env = Envelope::success().with_output_ref("/tmp/out/step.json");
        ctx.record_step_result("build", env);

        assert_eq!(ctx.substitute("${steps.build.status}"), "success");
        assert_eq!(ctx.substitute("${steps.build.output_ref}"), "/tmp/out/step.json");
    }

    #[test]
    fn substitutes_result_field() {
        let ctx = ResolutionContext::new(HashMap::new());
        let env = Envelope::success().with_result("cost_usd", 1.25);
        ctx.record_step_result("build", env);
        assert_eq!(ctx.substitute("${steps.build.result.cost_usd}"), "1.25");
    }

    #[test]
    fn substitutes_whole_result_map_as_json() {
        let ctx = ResolutionContext::new(HashMap::new());
        let env = Envelope::success().with_result("a", 1);
        ctx.record_step_result("build", env);
        assert_eq!(ctx.substitute("${steps.build.result}"), r#"{"a":1}"#);
    }

    #[test]
    fn substitutes_stdout_by_reading_output_file() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("step.json");
        fs::write(&out_path, r#"{"stdout":"hello","stderr":""}"#).unwrap();

        let ctx = ResolutionContext::new(HashMap::new());
        let env = Envelope::success().with_output_ref(&out_path);
        ctx.record_step_result("build", env);

        assert_eq!(ctx.substitute("${steps.build.stdout}"), "hello");
    }

    #[test]
    fn stdout_extracts_final_result_from_json_lines_stream() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("step.json");
        let stream = "{\"type\":\"system\"}\n{\"type\":\"result\",\"result\":\"42\"}\n";
        fs::write(&out_path, serde_json::json!({"stdout": stream, "stderr": ""}).to_string()).unwrap();

        let ctx = ResolutionContext::new(HashMap::new());
        let env = Envelope::success().with_output_ref(&out_path);
        ctx.record_step_result("build", env);

        assert_eq!(ctx.substitute("${steps.build.stdout}"), "42");
    }

    #[test]
    fn multiple_placeholders_in_one_template() {
        let ctx = ctx_with_input("name", "demo");
        let env = Envelope::success();
        ctx.record_step_result("a", env);
        assert_eq!(
            ctx.substitute("${inputs.name}: ${steps.a.status}, ${steps.missing.status}"),
            "demo: success, ${steps.missing.status}"
        );
    }

    #[test]
    fn tool_session_round_trips() {
        let ctx = ResolutionContext::new(HashMap::new());
        assert_eq!(ctx.tool_session("claude-code"), None);
        ctx.set_tool_session("claude-code", "sess-123");
        assert_eq!(ctx.tool_session("claude-code"), Some("sess-123".to_string()));
    }
}
