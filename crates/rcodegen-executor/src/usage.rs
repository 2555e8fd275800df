//! Per-tool-family usage/cost extraction (spec §4.7.1), one function per
//! [`ToolFamily`] behind a closed-enum match. All split/scale arithmetic
//! stays in floating point until the final integer conversion — an
//! integer-division split is explicitly a bug per spec.

use rcodegen_config::PricingConfig;
use rcodegen_core::tool::{ToolFamily, ToolName};
use regex::Regex;
use serde_json::Value;

/// Usage/cost fields attached to a tool step's envelope result.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageResult {
    pub cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

/// Extract usage for `tool` from its captured stdout/stderr, dispatching by
/// [`ToolFamily`]. Never fails: a family whose expected event/pattern never
/// shows up just yields all-zero usage.
pub fn extract_usage(tool: ToolName, stdout: &str, stderr: &str, pricing: &PricingConfig) -> UsageResult {
    match tool.family() {
        ToolFamily::StreamJsonPrompt => extract_stream_json_prompt(stdout),
        ToolFamily::StreamJsonContent => extract_stream_json_content(stdout, pricing),
        ToolFamily::ExecRegex => extract_exec_regex(stderr, pricing),
    }
}

/// Claude-like: the last `type: "result"` line carries `total_cost_usd` and
/// a full `usage` breakdown.
fn extract_stream_json_prompt(stdout: &str) -> UsageResult {
    for line in stdout.lines().rev() {
        let Ok(value) = serde_json::from_str::<Value>(line.trim()) else { continue };
        if value.get("type").and_then(Value::as_str) != Some("result") {
            continue;
        }
        let usage = value.get("usage");
        return UsageResult {
            cost_usd: value.get("total_cost_usd").and_then(Value::as_f64).unwrap_or(0.0),
            input_tokens: field_u64(usage, "input_tokens"),
            output_tokens: field_u64(usage, "output_tokens"),
            cache_read_tokens: field_u64(usage, "cache_read_input_tokens"),
            cache_write_tokens: field_u64(usage, "cache_creation_input_tokens"),
        };
    }
    UsageResult::default()
}

/// Gemini-like: a `stats.{input_tokens, output_tokens, cached}` object; cost
/// is computed from configured per-token pricing, not self-reported.
fn extract_stream_json_content(stdout: &str, pricing: &PricingConfig) -> UsageResult {
    for line in stdout.lines().rev() {
        let Ok(value) = serde_json::from_str::<Value>(line.trim()) else { continue };
        let Some(stats) = value.get("stats") else { continue };
        let input_tokens = field_u64(Some(stats), "input_tokens");
        let output_tokens = field_u64(Some(stats), "output_tokens");
        let cache_read_tokens = field_u64(Some(stats), "cached");
        return UsageResult {
            cost_usd: pricing.gemini_cost_usd(input_tokens as f64, output_tokens as f64),
            input_tokens,
            output_tokens,
            cache_read_tokens,
            cache_write_tokens: 0,
        };
    }
    UsageResult::default()
}

/// Codex-like: no per-field breakdown, only a combined `tokens used` count
/// on stderr, split at [`PricingConfig::codex_input_split_ratio`].
fn extract_exec_regex(stderr: &str, pricing: &PricingConfig) -> UsageResult {
    let Ok(pattern) = Regex::new(r"(?i)tokens used\s*\n\s*([\d,]+)") else {
        return UsageResult::default();
    };
    let Some(captures) = pattern.captures(stderr) else {
        return UsageResult::default();
    };
    let Some(total_str) = captures.get(1) else {
        return UsageResult::default();
    };
    let digits: String = total_str.as_str().chars().filter(|c| *c != ',').collect();
    let Ok(total) = digits.parse::<f64>() else {
        return UsageResult::default();
    };
    let (input_tokens, output_tokens, cost_usd) = pricing.codex_split_and_cost(total);
    UsageResult {
        cost_usd,
        input_tokens,
        output_tokens,
        cache_read_tokens: 0,
        cache_write_tokens: 0,
    }
}

fn field_u64(value: Option<&Value>, key: &str) -> u64 {
    value.and_then(|v| v.get(key)).and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_like_reads_total_cost_and_usage_breakdown() {
        let stdout = r#"{"type":"system"}
{"type":"result","total_cost_usd":0.42,"usage":{"input_tokens":100,"output_tokens":50,"cache_read_input_tokens":10,"cache_creation_input_tokens":5}}"#;
        let usage = extract_stream_json_prompt(stdout);
        assert_eq!(usage.cost_usd, 0.42);
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.output_tokens, 50);
        assert_eq!(usage.cache_read_tokens, 10);
        assert_eq!(usage.cache_write_tokens, 5);
    }

    #[test]
    fn claude_like_with_no_result_event_is_all_zero() {
        let usage = extract_stream_json_prompt(r#"{"type":"system"}"#);
        assert_eq!(usage, UsageResult::default());
    }

    #[test]
    fn gemini_like_computes_cost_from_pricing_not_self_reported() {
        let pricing = PricingConfig::default();
        let stdout = r#"{"stats":{"input_tokens":1000,"output_tokens":200,"cached":0}}"#;
        let usage = extract_stream_json_content(stdout, &pricing);
        assert_eq!(usage.input_tokens, 1000);
        assert_eq!(usage.output_tokens, 200);
        assert!((usage.cost_usd - pricing.gemini_cost_usd(1000.0, 200.0)).abs() < 1e-12);
    }

    #[test]
    fn codex_like_splits_at_named_ratio_with_float_math() {
        let pricing = PricingConfig::default();
        let stderr = "run complete\ntokens used\n15\ndone";
        let usage = extract_exec_regex(stderr, &pricing);
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 4);
    }

    #[test]
    fn codex_like_strips_thousands_separators() {
        let pricing = PricingConfig::default();
        let stderr = "tokens used\n1,500";
        let usage = extract_exec_regex(stderr, &pricing);
        // floor(1500*0.7) and floor(1500*0.3) modulo float rounding noise.
        let total = usage.input_tokens + usage.output_tokens;
        assert!((1498..=1500).contains(&total), "total was {total}");
    }

    #[test]
    fn codex_like_with_no_match_is_all_zero() {
        let pricing = PricingConfig::default();
        assert_eq!(extract_exec_regex("nothing relevant here", &pricing), UsageResult::default());
    }
}
