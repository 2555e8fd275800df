use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rcodegen_config::RuntimeConfig;
use rcodegen_core::tool::ToolName;
use rcodegen_core::CancelToken;
use rcodegen_executor::ToolExecutor;
use rcodegen_orchestrator::{load_bundle, run_bundle, ExecutorRegistry, RunOptions};
use rcodegen_task::{run_task, TaskOutcome, TaskRequest};

mod cli;

use cli::{BundleCommands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(|| std::path::PathBuf::from("rcodegen.toml"));
    let config = rcodegen_config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone());

    let exit_code = match cli.command {
        Commands::Task {
            tool,
            task,
            codebase,
            model,
            effort,
            budget_usd,
            prompt,
            report_dir,
            filename_prefix,
            require_review,
            delete_old,
            no_lock,
        } => {
            let tool_name = ToolName::from_str(&tool).map_err(anyhow::Error::msg)?;
            run_task_command(
                &config,
                tool_name,
                task,
                codebase,
                model,
                effort,
                budget_usd,
                prompt,
                report_dir,
                filename_prefix,
                require_review,
                delete_old,
                !no_lock,
                &cancel,
            )
            .await?
        }
        Commands::Bundle { command } => run_bundle_command(command, &config, &cancel).await?,
    };

    std::process::exit(exit_code);
}

#[allow(clippy::too_many_arguments)]
async fn run_task_command(
    config: &RuntimeConfig,
    tool: ToolName,
    task: String,
    codebase: std::path::PathBuf,
    model: Option<String>,
    effort: Option<String>,
    budget_usd: Option<f64>,
    prompt: String,
    report_dir: std::path::PathBuf,
    filename_prefix: String,
    require_review: bool,
    delete_old: bool,
    lock_enabled: bool,
    cancel: &CancelToken,
) -> Result<i32> {
    let binary = tool_binary(config, tool);
    let executor = ToolExecutor::new(tool, binary, config.pricing);

    let request = TaskRequest {
        codebase_identifier: codebase.display().to_string(),
        tool,
        task,
        model,
        effort,
        budget_usd,
        prompt_template: prompt,
        report_dir,
        lock_dir: config.lock_dir.clone(),
        workspace_root: config.workspace_root.clone(),
        filename_prefix,
        require_review,
        delete_old,
        lock_enabled,
    };

    let outcome = run_task(&request, &executor, cancel).await?;
    match &outcome {
        TaskOutcome::SkippedUnreviewed => {
            eprintln!("skipped: previous report unreviewed");
        }
        TaskOutcome::LockTimeout => {
            eprintln!("Error: LOCK_TIMEOUT");
        }
        TaskOutcome::Cancelled => {
            eprintln!("Error: CANCELLED");
        }
        TaskOutcome::Completed { exit_code, grade, .. } => {
            if *exit_code != 0 {
                eprintln!("Error: EXIT_{exit_code}");
            }
            if let Some(grade) = grade {
                println!("grade: {grade}");
            }
        }
    }
    Ok(outcome.exit_code())
}

async fn run_bundle_command(command: BundleCommands, config: &RuntimeConfig, cancel: &CancelToken) -> Result<i32> {
    match command {
        BundleCommands::Run { bundle_file, inputs, base_dir, model_override } => {
            let contents = std::fs::read_to_string(&bundle_file)
                .with_context(|| format!("reading bundle file {}", bundle_file.display()))?;
            let bundle = load_bundle(&contents).context("loading bundle definition")?;

            let mut registry = ExecutorRegistry::new();
            rcodegen_executor::register_default_executors(&mut registry, config);

            let inputs: HashMap<String, String> = inputs.into_iter().collect();
            let options = RunOptions { tolerate_partial: true, model_override };

            let (run_envelope, _workspace) = run_bundle(
                &bundle,
                Some(&bundle_file),
                inputs,
                &base_dir,
                Arc::new(registry),
                cancel.clone(),
                options,
            )
            .await
            .context("running bundle")?;

            println!("{}", serde_json::to_string_pretty(&run_envelope)?);
            Ok(if run_envelope.is_failure() { 1 } else { 0 })
        }
        BundleCommands::Describe { bundle_file } => {
            let contents = std::fs::read_to_string(&bundle_file)
                .with_context(|| format!("reading bundle file {}", bundle_file.display()))?;
            let bundle = load_bundle(&contents).context("loading bundle definition")?;
            let inputs = rcodegen_orchestrator::bundle::describe_inputs(&bundle);
            println!("{}", serde_json::to_string_pretty(&inputs)?);
            Ok(0)
        }
    }
}

fn tool_binary(config: &RuntimeConfig, tool: ToolName) -> String {
    match tool {
        ToolName::ClaudeCode => config.tool_binaries.claude_code.clone(),
        ToolName::Codex => config.tool_binaries.codex.clone(),
        ToolName::GeminiCli => config.tool_binaries.gemini_cli.clone(),
        ToolName::Opencode => config.tool_binaries.opencode.clone(),
    }
}

/// Wire SIGINT to the cancellation signal (spec §5): a Ctrl-C raises the
/// same token the orchestrator and lock-wait loops observe, rather than
/// killing the process outright and leaving subprocesses orphaned.
fn install_ctrlc_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });
}
