//! The uniform result envelope (spec component C1).
//!
//! Every step of a bundle run — whether a single tool invocation or an
//! aggregate over a parallel/merge/vote step — produces one of these.
//! Envelopes are values: they get copied into the resolution context, never
//! shared by reference, so later steps cannot observe in-place mutation of
//! an earlier step's result.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal status of a completed (or skipped) step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
    Partial,
    Skipped,
}

impl StepStatus {
    /// The string form used by `${steps.<name>.status}` substitution.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Partial => "partial",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error attached to a `Failure` envelope. Never present on `Success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
}

/// Execution metrics attached to an envelope, when known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// The standardized result of executing one step.
///
/// Constructed via [`Envelope::success`], [`Envelope::failure`] or
/// [`Envelope::partial`] and then decorated with the `with_*` builder
/// methods, mirroring the small infallible-builder idiom used throughout
/// the tool executor's `ExecuteOptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub result: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EnvelopeMetrics>,
}

impl Envelope {
    /// A successful envelope with no error, no output, no result entries yet.
    pub fn success() -> Self {
        Self {
            status: StepStatus::Success,
            error: None,
            output_ref: None,
            result: Map::new(),
            metrics: None,
        }
    }

    /// A failed envelope. `failure ⇒ error ≠ nil` is enforced by construction:
    /// there is no way to build a `Failure` envelope without a code/message.
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failure,
            error: Some(EnvelopeError {
                code: code.into(),
                message: message.into(),
            }),
            output_ref: None,
            result: Map::new(),
            metrics: None,
        }
    }

    /// A partial-success envelope (used by the parallel aggregator when some
    /// but not all substeps failed).
    pub fn partial() -> Self {
        Self {
            status: StepStatus::Partial,
            error: None,
            output_ref: None,
            result: Map::new(),
            metrics: None,
        }
    }

    /// A skipped envelope (condition evaluated false, or an `if`/`else`
    /// step with no `else` branch taken).
    pub fn skipped() -> Self {
        Self {
            status: StepStatus::Skipped,
            error: None,
            output_ref: None,
            result: Map::new(),
            metrics: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == StepStatus::Failure
    }

    /// Attach/replace the output reference (absolute path of the JSON file
    /// this step wrote into the workspace).
    pub fn with_output_ref(mut self, path: impl AsRef<Path>) -> Self {
        self.output_ref = Some(path.as_ref().to_path_buf());
        self
    }

    /// Attach a single named result value (string → any JSON value).
    pub fn with_result(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.result.insert(key.into(), value.into());
        self
    }

    /// Replace the metrics block wholesale.
    pub fn with_metrics(mut self, metrics: EnvelopeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Attach tool name, creating the metrics block if absent.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.metrics.get_or_insert_with(Default::default).tool = Some(tool.into());
        self
    }

    /// Attach duration in milliseconds, creating the metrics block if absent.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.metrics.get_or_insert_with(Default::default).duration_ms = duration_ms;
        self
    }

    /// Attach the session id observed from this step's tool invocation.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.metrics.get_or_insert_with(Default::default).session_id = Some(session_id.into());
        self
    }

    /// Read a numeric result field as `f64`, defaulting to 0.0 if absent or
    /// non-numeric. Used by the parallel aggregator to sum `cost_usd` and
    /// token counters across substeps.
    pub fn result_f64(&self, key: &str) -> f64 {
        self.result.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_no_error() {
        let env = Envelope::success();
        assert!(env.is_success());
        assert!(env.error.is_none());
    }

    #[test]
    fn failure_always_has_error() {
        let env = Envelope::failure("EXIT_1", "boom");
        assert!(env.is_failure());
        assert_eq!(env.error.as_ref().unwrap().code, "EXIT_1");
        assert_eq!(env.error.as_ref().unwrap().message, "boom");
    }

    #[test]
    fn partial_and_skipped_have_no_error() {
        assert!(Envelope::partial().error.is_none());
        assert!(Envelope::skipped().error.is_none());
    }

    #[test]
    fn builder_is_chainable_and_total() {
        let env = Envelope::success()
            .with_output_ref("/tmp/out.json")
            .with_result("cost_usd", 0.5)
            .with_tool("claude-code")
            .with_duration_ms(1200)
            .with_session_id("sess-1");

        assert_eq!(env.output_ref, Some(PathBuf::from("/tmp/out.json")));
        assert_eq!(env.result_f64("cost_usd"), 0.5);
        let metrics = env.metrics.unwrap();
        assert_eq!(metrics.tool.as_deref(), Some("claude-code"));
        assert_eq!(metrics.duration_ms, 1200);
        assert_eq!(metrics.session_id.as_deref(), Some("sess-1"));
    }

    #[test]
    fn result_f64_defaults_to_zero() {
        let env = Envelope::success();
        assert_eq!(env.result_f64("missing"), 0.0);
    }

    #[test]
    fn status_display_matches_substitution_strings() {
        assert_eq!(StepStatus::Success.as_str(), "success");
        assert_eq!(StepStatus::Failure.as_str(), "failure");
        assert_eq!(StepStatus::Partial.as_str(), "partial");
        assert_eq!(StepStatus::Skipped.as_str(), "skipped");
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let env = Envelope::failure("TIMEOUT", "exceeded 30m")
            .with_tool("codex")
            .with_result("attempt", 2);
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, StepStatus::Failure);
        assert_eq!(back.error.unwrap().code, "TIMEOUT");
        assert_eq!(back.result.get("attempt").unwrap().as_i64(), Some(2));
    }
}
