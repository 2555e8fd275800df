//! Argv shape for the `rcodegen` binary: a `task` command (single-tool
//! convenience runner, C11) and a `bundle` command (DAG orchestrator, C10).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rcodegen", version, about = "Multi-tool AI coding assistant orchestration engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML settings file (spec §6.5); defaults applied if absent.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single task against one AI tool (spec §4.11).
    Task {
        /// Tool to invoke.
        #[arg(long)]
        tool: String,

        /// Task name (used in report filenames and grade bookkeeping).
        #[arg(long)]
        task: String,

        /// Codebase directory this run applies to; also the lock identifier.
        #[arg(long, default_value = ".")]
        codebase: PathBuf,

        /// Override the tool's default model.
        #[arg(long)]
        model: Option<String>,

        /// Reasoning effort (Codex-like tools only).
        #[arg(long)]
        effort: Option<String>,

        /// Per-step budget in USD (Claude-like tools only).
        #[arg(long)]
        budget_usd: Option<f64>,

        /// Prompt template; may use {report_dir} and {timestamp}.
        #[arg(long)]
        prompt: String,

        /// Directory the external tool writes its report into.
        #[arg(long, default_value = "_rcodegen")]
        report_dir: PathBuf,

        /// Report filename prefix used for discovery and review gating.
        #[arg(long)]
        filename_prefix: String,

        /// Skip the run if the previous report for this task is unreviewed.
        #[arg(long)]
        require_review: bool,

        /// Delete all but the newest report for this task after a
        /// successful run.
        #[arg(long)]
        delete_old: bool,

        /// Disable the cross-process codebase lock (spec C3).
        #[arg(long)]
        no_lock: bool,
    },

    /// Bundle orchestration subcommands.
    Bundle {
        #[command(subcommand)]
        command: BundleCommands,
    },
}

#[derive(Subcommand)]
pub enum BundleCommands {
    /// Run a declarative bundle definition to completion (spec C10).
    Run {
        /// Path to the bundle's TOML definition.
        bundle_file: PathBuf,

        /// Bundle input as `name=value`; may be repeated.
        #[arg(long = "input", value_parser = parse_key_value)]
        inputs: Vec<(String, String)>,

        /// Base directory under which a job workspace is created.
        #[arg(long, default_value = "/tmp/rcodegen/workspace")]
        base_dir: PathBuf,

        /// Force every step in the bundle onto this model without mutating
        /// the bundle definition (spec §4.10 step 4).
        #[arg(long)]
        model_override: Option<String>,
    },

    /// Print a bundle's declared inputs without running it.
    Describe {
        bundle_file: PathBuf,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) => Ok((k.to_string(), v.to_string())),
        None => Err(format!("expected `name=value`, got `{s}`")),
    }
}
