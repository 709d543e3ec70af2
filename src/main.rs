//! ghly - a caching proxy for GitHub raw content
//!
//! This is the main entry point for the ghly server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use ghly::app::{build_cache, build_engine};
use ghly::config::Config;
use ghly::error::AppError;
use ghly::otel::{init_tracing, Metrics, OtelProvider};
use ghly::plugins::cache::spawn_expiry_sweeper;
use ghly::server::{AppState, Server};

/// ghly - a caching proxy for GitHub raw content
#[derive(Parser, Debug)]
#[command(name = "ghly")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "GHLY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let otel_provider = OtelProvider::new(&config.otel).map_err(AppError::from)?;
    init_tracing(&otel_provider, &config.logging).map_err(AppError::from)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting ghly");

    let cache = build_cache(&config).await?;
    let metrics = Arc::new(Metrics::new(&otel_provider.meter()));
    let engine = Arc::new(build_engine(&config, Arc::clone(&cache), metrics)?);

    info!(
        ttl_secs = config.cache.ttl_secs,
        upstream = %config.upstream.github_raw_url,
        "Proxy engine initialized"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sweeper = if config.cache.sweep_interval_secs > 0 {
        Some(spawn_expiry_sweeper(
            Arc::clone(&cache),
            Duration::from_secs(config.cache.sweep_interval_secs),
            shutdown_tx.subscribe(),
        ))
    } else {
        None
    };

    let server = Server::new(config.server.clone(), AppState { engine });

    let result = server
        .run(shutdown_signal())
        .await
        .map_err(AppError::from);
    if let Err(ref e) = result {
        error!(error = %e, "Server error");
    }

    let _ = shutdown_tx.send(());
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            error!(error = %e, "Expiry sweeper task failed");
        }
    }

    if let Err(e) = otel_provider.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("ghly stopped");
    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Resolves when SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
