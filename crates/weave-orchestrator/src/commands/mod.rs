use std::path::PathBuf;

use clap::{Parser, Subcommand};
use weave_config::ConfigLoader;

mod chat;

/// Drives the LLM conversation and dispatches accepted prompts to the GPU
/// compute worker.
#[derive(Parser)]
#[command(name = "weave-orchestrator", version, about, long_about = None)]
pub struct Cli {
    /// Path to weave.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the worker socket directory name under XDG_RUNTIME_DIR
    #[arg(long, global = true)]
    socket_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat that refines a prompt and dispatches it to the worker
    Chat,
}

impl Cli {
    pub async fn run(self) -> weave_core::Result<()> {
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };

        if config.logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
                )
                .json()
                .with_target(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
                )
                .with_target(false)
                .init();
        }

        let socket_dir = self.socket_dir.as_deref().unwrap_or(&config.worker.socket_dir);
        let socket_path = weave_socket::socket_path_in(socket_dir, &config.worker.socket_file)?;

        match self.command {
            Commands::Chat => chat::cmd_chat(config, socket_path).await,
        }
    }
}
