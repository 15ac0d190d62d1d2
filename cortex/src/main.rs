//! Autonomous think → act → observe mission runner.
//!
//! Asks a language model for one shell command at a time, runs it, and feeds
//! the result back until the model declares success or failure. Then writes
//! a narrative report of the mission.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use tracing::info;

use cortex::console::TerminalConsole;
use cortex::core::types::{MissionSpec, Outcome};
use cortex::exit_codes;
use cortex::io::config::{CortexConfig, Provider, load_config};
use cortex::io::history_store::write_history;
use cortex::io::shell::ShellExecutor;
use cortex::io::spill::OutputSpillManager;
use cortex::llm::Backend;
use cortex::llm::hosted::HostedBackend;
use cortex::llm::local::LocalBackend;
use cortex::llm::retry::{RetryPolicy, RetryingClient};
use cortex::logging;
use cortex::mission::{MissionController, MissionSettings};
use cortex::prompt::PromptEngine;
use cortex::report::ReportSynthesizer;

#[derive(Parser)]
#[command(
    name = "cortex",
    version,
    about = "Autonomous think-act-observe mission runner"
)]
struct Cli {
    /// The mission's target.
    #[arg(long)]
    target: String,

    /// The mission's objective.
    #[arg(long)]
    objective: String,

    /// Model backend (overrides the config file).
    #[arg(long, value_enum)]
    provider: Option<Provider>,

    /// Model name. Required for `ollama`.
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the local model server.
    #[arg(long)]
    ollama_url: Option<String>,

    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mirror console output, without colors, to this file.
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Write the mission history as JSON to this file when the mission ends.
    #[arg(long)]
    history_json: Option<PathBuf>,

    /// Stop after this many steps (overrides the config file).
    #[arg(long)]
    max_steps: Option<u32>,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    yes: bool,

    /// Credential for the hosted provider.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

fn main() {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mission = MissionSpec::new(cli.target.clone(), cli.objective.clone())?;
    let config = resolve_config(&cli)?;
    let backend = build_backend(&config, cli.api_key.as_deref())?;
    #[cfg(unix)]
    cortex::io::interrupt::install()?;

    let console = match &cli.transcript {
        Some(path) => TerminalConsole::with_transcript(path)?,
        None => TerminalConsole::new(),
    };
    console.banner();
    if !cli.yes && !confirm_start()? {
        eprintln!("\nExecution cancelled.");
        return Ok(exit_codes::INVALID);
    }

    fs::create_dir_all(&config.spill_dir)
        .with_context(|| format!("create spill directory {}", config.spill_dir.display()))?;

    let client = RetryingClient::new(
        backend,
        RetryPolicy {
            max_attempts: config.max_attempts,
            backoff_base: Duration::from_secs(config.backoff_base_secs),
        },
    );
    let spill = OutputSpillManager::new(&config.spill_dir, config.spill_threshold_chars);
    let prompts = PromptEngine::new();
    let system_prompt = prompts.system_prompt(spill.threshold())?;
    let executor = ShellExecutor::new(config.output_limit_bytes);
    let settings = MissionSettings {
        command_timeout: Duration::from_secs(config.command_timeout_secs),
        max_steps: config.max_steps,
    };

    info!(provider = ?config.provider, model = config.model_name(), "starting mission");
    let finished = MissionController::new(
        mission.clone(),
        system_prompt,
        &client,
        &executor,
        &console,
        spill,
        settings,
    )
    .run()?;

    ReportSynthesizer::new(&client, &prompts).generate_and_render(
        &mission,
        &finished.history,
        &console,
    )?;

    if let Some(path) = &cli.history_json {
        write_history(path, &mission, Some(finished.outcome()), &finished.history)
            .with_context(|| format!("write history {}", path.display()))?;
    }

    Ok(match finished.outcome() {
        Outcome::Success => exit_codes::OK,
        Outcome::Failure => exit_codes::MISSION_FAILED,
    })
}

/// Load the config file and apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<CortexConfig> {
    let mut config = match &cli.config {
        Some(path) if !path.exists() => bail!("config file {} not found", path.display()),
        Some(path) => load_config(path)?,
        None => CortexConfig::default(),
    };
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(url) = &cli.ollama_url {
        config.ollama_url = url.clone();
    }
    if let Some(max_steps) = cli.max_steps {
        config.max_steps = Some(max_steps);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_backend(config: &CortexConfig, api_key: Option<&str>) -> Result<Box<dyn Backend>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    match config.provider {
        Provider::Openrouter => {
            let Some(key) = api_key.filter(|key| !key.trim().is_empty()) else {
                bail!("OPENROUTER_API_KEY environment variable not set");
            };
            let backend =
                HostedBackend::new(&config.openrouter_url, key, config.model_name(), timeout)?;
            Ok(Box::new(backend))
        }
        Provider::Ollama => {
            let backend = LocalBackend::new(&config.ollama_url, config.model_name(), timeout)?;
            Ok(Box::new(backend))
        }
    }
}

/// Wait for Enter. Returns `false` when stdin is closed.
fn confirm_start() -> Result<bool> {
    print!("{}", "Press Enter to continue...".yellow());
    io::stdout().flush().context("flush stdout")?;
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read confirmation")?;
    Ok(read > 0)
}
