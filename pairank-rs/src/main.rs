//! pairank-rs (Rating Server) - pairwise comparison rating service
//!
//! Serves comparison tasks to human raters, records their votes, and keeps
//! durable per-rater progress and aggregate candidate scores.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pairank_common::config::{load_config, resolve_config_path, TomlConfig};
use pairank_common::{ExperimentDefinition, JsonFileStore, Ledger, TaskSet};
use pairank_rs::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pairank-rs
#[derive(Parser, Debug)]
#[command(name = "pairank-rs")]
#[command(about = "Pairwise comparison rating server")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config_dir>/pairank/config.toml if present)
    #[arg(short, long, env = "PAIRANK_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PAIRANK_PORT")]
    port: Option<u16>,

    /// Host/interface to bind
    #[arg(long, env = "PAIRANK_BIND_HOST")]
    bind_host: Option<String>,

    /// Experiment definition JSON
    #[arg(short, long, env = "PAIRANK_EXPERIMENT")]
    experiment: Option<PathBuf>,

    /// Progress snapshot JSON (created if missing)
    #[arg(long, env = "PAIRANK_PROGRESS")]
    progress: Option<PathBuf>,

    /// Directory served under /static
    #[arg(long, env = "PAIRANK_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

impl Args {
    /// Command-line values win over the config file
    fn apply(self, mut config: TomlConfig) -> TomlConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.bind_host {
            config.bind_host = host;
        }
        if let Some(path) = self.experiment {
            config.experiment_path = path;
        }
        if let Some(path) = self.progress {
            config.progress_path = path;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = Some(dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    let config = args.apply(config);

    // RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "pairank_rs={level},pairank_common={level},tower_http={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting pairank Rating Server (pairank-rs) v{}",
        env!("CARGO_PKG_VERSION")
    );
    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file found, using built-in defaults"),
    }

    let definition = ExperimentDefinition::load(&config.experiment_path)
        .context("Failed to load experiment definition")?;
    let tasks = Arc::new(TaskSet::build(&definition).context("Invalid experiment definition")?);

    info!("Progress snapshot: {}", config.progress_path.display());
    let store = Arc::new(JsonFileStore::new(&config.progress_path));
    let ledger = Ledger::open(tasks, &definition.weights, store)
        .context("Failed to load stored progress")?;

    if let Some(dir) = &config.static_dir {
        if !dir.is_dir() {
            anyhow::bail!("Static directory does not exist: {}", dir.display());
        }
        info!("Serving /static from {}", dir.display());
    }

    let state = AppState::new(Arc::new(ledger));
    let app = build_router(state, config.static_dir.clone());

    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("pairank-rs listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
