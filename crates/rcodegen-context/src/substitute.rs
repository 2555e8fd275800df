//! `${...}` placeholder parsing and resolution helpers used by
//! [`crate::context::ResolutionContext::substitute`].

use serde_json::Value;

/// A parsed `${head.rest}` placeholder.
#[derive(Debug, PartialEq)]
pub(crate) enum Placeholder {
    Input(String),
    StepOutputRef(String),
    StepStatus(String),
    StepStdout(String),
    StepStderr(String),
    StepResult(String),
    StepResultField(String, String),
}

/// Find every `${...}` span in `template` (non-nested — the first `}` after
/// `${` closes it) and return `(start, end, raw_inner)` triples in order.
pub(crate) fn find_placeholders(template: &str) -> Vec<(usize, usize, String)> {
    let mut found = Vec::new();
    let mut search_from = 0usize;
    while let Some(rel_start) = template[search_from..].find("${") {
        let start = search_from + rel_start;
        match template[start..].find('}') {
            Some(rel_end) => {
                let end = start + rel_end + 1;
                let inner = template[start + 2..end - 1].to_string();
                found.push((start, end, inner));
                search_from = end;
            }
            None => break,
        }
    }
    found
}

pub(crate) fn parse_placeholder(inner: &str) -> Option<Placeholder> {
    let mut head_rest = inner.splitn(2, '.');
    let head = head_rest.next()?;
    let rest = head_rest.next()?;

    match head {
        "inputs" => Some(Placeholder::Input(rest.to_string())),
        "steps" => {
            let mut it = rest.splitn(2, '.');
            let step = it.next()?.to_string();
            let field = it.next()?;
            if field == "output_ref" {
                Some(Placeholder::StepOutputRef(step))
            } else if field == "status" {
                Some(Placeholder::StepStatus(step))
            } else if field == "stdout" {
                Some(Placeholder::StepStdout(step))
            } else if field == "stderr" {
                Some(Placeholder::StepStderr(step))
            } else if field == "result" {
                Some(Placeholder::StepResult(step))
            } else if let Some(sub_field) = field.strip_prefix("result.") {
                Some(Placeholder::StepResultField(step, sub_field.to_string()))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Render a JSON value the way a substitution result should look: a JSON
/// string value substitutes as its bare contents, everything else as its
/// JSON text form.
pub(crate) fn value_to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Given the raw contents of a step's `{stdout, stderr}` output file, pull
/// out one field, applying the JSON-lines "final `type: result` object's
/// `result` field" extraction when that field looks like a streamed
/// assistant transcript.
pub(crate) fn extract_output_field(raw_json: &str, field: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(raw_json).ok()?;
    let field_value = parsed.get(field)?;
    let raw = match field_value {
        Value::String(s) => s.clone(),
        other => return Some(value_to_display_string(other)),
    };
    Some(extract_stream_result(&raw))
}

/// Scan `raw` as newline-delimited JSON; if any line decodes to an object
/// with `type == "result"`, return the display form of its last such
/// `result` field. Otherwise return `raw` unchanged.
fn extract_stream_result(raw: &str) -> String {
    let mut last_result = None;
    for line in raw.lines() {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if value.get("type").and_then(Value::as_str) == Some("result") {
            if let Some(result) = value.get("result") {
                last_result = Some(value_to_display_string(result));
            }
        }
    }
    last_result.unwrap_or_else(|| raw.to_string())
}
