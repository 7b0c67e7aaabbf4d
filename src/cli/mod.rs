//! Command-line interface.
//!
//! One subcommand per daemon:
//!
//! - `gateway` - carbonapi v3 endpoints over the Prometheus backend
//! - `relay` - plaintext carbon ingest rewriting
//! - `proxy` - Prometheus API proxy with query rewriting
//!
//! All three read the same TOML config file; flags and `CARBONGATE_*`
//! environment variables override it.

pub mod gateway;
pub mod proxy;
pub mod relay;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// Carbongate - Graphite to Prometheus translation layer
#[derive(Parser, Debug)]
#[command(
    name = "carbongate",
    version,
    about = "Graphite-to-Prometheus translation layer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the carbonapi find/render endpoints
    Gateway(DaemonArgs),
    /// Relay plaintext carbon lines into the backend
    Relay(DaemonArgs),
    /// Proxy the Prometheus HTTP API, rewriting Graphite-style queries
    Proxy(DaemonArgs),
}

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "carbongate.toml")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(short, long, env = "CARBONGATE_LISTEN")]
    pub listen: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, env = "CARBONGATE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Load configuration with CLI overrides applied to the given daemon's
/// listen address. Absent config files fall back to defaults; a present
/// but broken file is fatal.
pub(crate) fn load_config(args: &DaemonArgs, listen: impl FnOnce(&mut Config) -> &mut String) -> anyhow::Result<Config> {
    let mut config = if args.config.exists() {
        Config::load(Some(&args.config))?
    } else {
        Config::default()
    };

    config = config.with_env_overrides();

    if let Some(ref addr) = args.listen {
        *listen(&mut config) = addr.clone();
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Wait for SIGINT or SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
