//! Relay command implementation

use tokio_util::sync::CancellationToken;

use crate::cli::{load_config, shutdown_signal, DaemonArgs};
use crate::{logging, relay};

pub async fn run(args: DaemonArgs) -> anyhow::Result<()> {
    let config = load_config(&args, |c| &mut c.relay.listen)?;
    logging::init(&config.logging).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing::info!(upstream = %config.relay.carbon_addr, "Starting carbon relay");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    relay::run(config.relay, shutdown).await
}
