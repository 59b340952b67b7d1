//! # Chorus Launcher
//!
//! ```text
//! chorus [--config <path>] [identifier]     deploy a block or remote
//! chorus generate                           secrets, pre-shared secrets, tokens
//! chorus generate-secrets
//! chorus generate-preshared
//! chorus generate-tokens
//! chorus help
//! ```
//!
//! Logging is controlled by `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use node_runtime::config::ENV_CONFIG;
use node_runtime::{nodes, AuthenticationGenerator, Configuration, Launcher};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "chorus", version, about = "Deploys Chorus nodes onto a shared message bus")]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Configuration file (overrides CHORUS_CONFIG).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Block or remote host to deploy; falls back to the default block.
    identifier: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print usage.
    Help,
    /// Generate secrets, pre-shared secrets and tokens.
    Generate,
    /// Generate per-service secrets.
    GenerateSecrets,
    /// Generate secrets shared between services.
    GeneratePreshared,
    /// Generate service tokens.
    GenerateTokens,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {e}");
    }

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Some(Command::Help)) {
        Cli::command().print_help()?;
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        None => launch(config, cli.identifier.as_deref()).await,
        Some(Command::Help) => Ok(()),
        Some(Command::Generate) => generator(config).all().context("Generation failed"),
        Some(Command::GenerateSecrets) => generator(config)
            .secrets()
            .context("Secret generation failed"),
        Some(Command::GeneratePreshared) => generator(config)
            .preshare()
            .context("Pre-shared secret generation failed"),
        Some(Command::GenerateTokens) => generator(config)
            .tokens()
            .context("Token generation failed"),
    }
}

fn load_config(path: Option<&Path>) -> Result<Configuration> {
    match path {
        Some(path) => {
            let mut config = Configuration::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config.validate().context("Invalid configuration")?;
            Ok(config)
        }
        None => Configuration::from_env()
            .with_context(|| format!("Failed to load configuration (set {ENV_CONFIG} to override)")),
    }
}

fn generator(config: Configuration) -> AuthenticationGenerator {
    info!(directory = %config.system.config_directory.display(), "Generating authentication");
    AuthenticationGenerator::new(
        config.system.config_directory,
        config.security,
        config.dependencies,
    )
}

async fn launch(config: Configuration, identifier: Option<&str>) -> Result<()> {
    let launcher =
        Launcher::new(config, nodes::builtin()).context("Failed to initialize launcher")?;

    if let Err(e) = launcher.start(identifier).await {
        if let Err(shutdown) = launcher.shutdown().await {
            error!(error = %shutdown, "Cleanup after failed startup did not finish");
        }
        return Err(e).context("Startup failed");
    }

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    launcher.shutdown().await.context("Shutdown failed")?;
    Ok(())
}
