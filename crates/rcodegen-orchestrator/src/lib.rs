//! The bundle orchestrator: step/bundle data model (C3 subset), the
//! executor-registry seam that keeps tool invocation out of this crate's
//! dependency graph (spec §9 "Factory wiring"), the parallel/merge/vote
//! executors and step dispatcher (C8/C9), and the sequential bundle engine
//! (C10).

pub mod bundle;
pub mod dispatch;
pub mod executor_trait;
pub mod step;

pub use bundle::{BundleRunError, RunOptions, run_bundle};
pub use dispatch::dispatch_step;
pub use executor_trait::{ExecutorRegistry, StepExecutor};
pub use step::{
    Bundle, BundleValidationError, InputSpec, LoadBundleError, MergeSpec, MergeStrategy, Step, StepShape,
    VoteSpec, VoteStrategy, load_bundle, validate_bundle,
};
