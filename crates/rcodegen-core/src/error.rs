//! Error taxonomy: one variant per documented code.
//!
//! A flat `thiserror` enum carrying just enough fields to format the exact
//! code string, with a single `code()`/`into_failure_envelope()` funnel so
//! every fallible call site produces an envelope the same way.

use crate::envelope::Envelope;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("subprocess exited with status {0}")]
    Exit(i32),

    #[error("subprocess exceeded its wall-clock budget")]
    Timeout,

    #[error("cancellation signal observed")]
    Cancelled,

    #[error("dispatcher could not classify step '{0}'")]
    UnknownStep(String),

    #[error("invalid model '{0}' for tool '{1}'")]
    InvalidModel(String, String),

    #[error("invalid budget value '{0}'")]
    InvalidBudget(String),

    #[error("invalid reasoning effort '{0}'")]
    InvalidEffort(String),

    #[error("file lock not acquired within the timeout")]
    LockTimeout,

    #[error("failed to write workspace output: {0}")]
    OutputWriteError(String),

    #[error("report file not found for task '{0}'")]
    ReportNotFound(String),

    #[error("settings file is world-writable and was refused: {0}")]
    UnsafeSettings(String),
}

impl CoreError {
    /// The short machine-readable code, exactly as it appears in an
    /// [`Envelope`]'s `error.code` field.
    pub fn code(&self) -> String {
        match self {
            Self::Exit(n) => format!("EXIT_{n}"),
            Self::Timeout => "TIMEOUT".to_string(),
            Self::Cancelled => "CANCELLED".to_string(),
            Self::UnknownStep(_) => "UNKNOWN_STEP".to_string(),
            Self::InvalidModel(..) => "INVALID_MODEL".to_string(),
            Self::InvalidBudget(_) => "INVALID_BUDGET".to_string(),
            Self::InvalidEffort(_) => "INVALID_EFFORT".to_string(),
            Self::LockTimeout => "LOCK_TIMEOUT".to_string(),
            Self::OutputWriteError(_) => "OUTPUT_WRITE_ERROR".to_string(),
            Self::ReportNotFound(_) => "REPORT_NOT_FOUND".to_string(),
            Self::UnsafeSettings(_) => "UNSAFE_SETTINGS".to_string(),
        }
    }

    /// Whether this error should fail the whole run (exit code 1) vs. only
    /// be logged (e.g. `REPORT_NOT_FOUND` is non-fatal per §7).
    pub fn is_fatal_to_run(&self) -> bool {
        !matches!(self, Self::ReportNotFound(_))
    }

    /// Build the failure envelope this error maps to. One funnel for every
    /// fallible call site keeps `failure ⇒ error present` true by construction.
    pub fn into_failure_envelope(self) -> Envelope {
        let code = self.code();
        let message = self.to_string();
        Envelope::failure(code, message)
    }
}
