//! Proxy command implementation

use std::sync::Arc;

use crate::cli::{load_config, shutdown_signal, DaemonArgs};
use crate::logging;
use crate::proxy::{create_router, ProxyState};

pub async fn run(args: DaemonArgs) -> anyhow::Result<()> {
    let config = load_config(&args, |c| &mut c.proxy.listen)?;
    logging::init(&config.logging).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing::info!(backend = %config.proxy.prometheus_url, "Starting query proxy");

    let state = Arc::new(ProxyState::new(&config.proxy)?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.proxy.listen).await?;
    tracing::info!(addr = %config.proxy.listen, "query proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
