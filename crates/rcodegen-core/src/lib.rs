//! Shared types for the rcodegen orchestration core: the result envelope,
//! the tool/status enums, the error taxonomy, and a lightweight cancellation
//! signal threaded through the executor and orchestrator layers.

pub mod cancel;
pub mod envelope;
pub mod error;
pub mod tool;

pub use cancel::CancelToken;
pub use envelope::{Envelope, EnvelopeError, EnvelopeMetrics, StepStatus};
pub use error::CoreError;
pub use tool::{ToolFamily, ToolName};
