//! Gateway command implementation

use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::cli::{load_config, shutdown_signal, DaemonArgs};
use crate::logging;

pub async fn run(args: DaemonArgs) -> anyhow::Result<()> {
    let config = load_config(&args, |c| &mut c.gateway.listen)?;
    logging::init(&config.logging).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing::info!(backend = %config.gateway.prometheus_url, "Starting carbonapi gateway");

    let state = Arc::new(AppState::new(config.gateway.clone())?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.gateway.listen).await?;
    tracing::info!(addr = %config.gateway.listen, "carbonapi gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
