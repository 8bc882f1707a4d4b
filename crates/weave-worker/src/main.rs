mod handler;
mod synth;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use weave_config::ConfigLoader;

/// GPU compute worker. Listens on a Unix domain socket and answers generate
/// requests with a deterministic synthetic image; never a real renderer.
#[derive(Parser, Debug)]
#[command(name = "weave-worker", version, about)]
struct Args {
    /// Path to weave.toml. Defaults to WEAVE_CONFIG or ~/.config/weave/weave.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the socket directory name under XDG_RUNTIME_DIR.
    #[arg(long)]
    socket_dir: Option<String>,

    /// Override the log level (error, warn, info, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let config_loader = match ConfigLoader::load(args.config.as_deref()) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("❌ failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    let config = config_loader.get();

    let log_level = args.log_level.as_deref().unwrap_or(&config.logging.level);
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

    if let Err(e) = run(args, config).await {
        error!(error = %e, "worker exited with error");
        std::process::exit(1);
    }
}

async fn run(args: Args, config: weave_config::WeaveConfig) -> weave_core::Result<()> {
    let socket_dir = args.socket_dir.as_deref().unwrap_or(&config.worker.socket_dir);
    let socket_path = weave_socket::socket_path_in(socket_dir, &config.worker.socket_file)?;

    let listener = weave_socket::WeaveListener::bind(&socket_path)?;
    info!(path = %socket_path.display(), "worker listening");

    let shutdown = listener.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c, shutting down");
            shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let config = Arc::new(config);

    // A single accept loop, handled strictly serially per connection: no
    // per-connection task spawn, no worker pool. The worker speaks to one
    // orchestrator connection at a time by design.
    loop {
        match listener.accept().await? {
            Some((stream, peer_uid)) => {
                handler::handle_connection(stream, peer_uid, Arc::clone(&config)).await;
            }
            None => {
                info!("accept loop stopped");
                break;
            }
        }
    }

    Ok(())
}
