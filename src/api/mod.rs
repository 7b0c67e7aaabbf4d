//! carbonapi v3 gateway.
//!
//! Serves the two protobuf endpoints dashboards speak (`/metrics/find/`
//! and `/render/`) plus a liveness probe. Each multi-request fans out one
//! concurrent lookup per target against the backend; a failed target is
//! logged and omitted so the rest of the batch still renders.

pub mod find;
pub mod render;
pub mod rollup;

pub use rollup::RollupTable;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prost::Message;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::backend::PromClient;
use crate::config::GatewayConfig;

/// Maximum request body size (4 MB). Requests are protobuf target lists;
/// anything bigger is garbage.
const MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Targets longer than this overload the backend. Usually caused by a
/// Grafana variable's All option expanding into every value.
pub(crate) const MAX_TARGET_LEN: usize = 8192;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub backend: PromClient,
    pub rollups: RollupTable,
}

impl AppState {
    /// Create application state from gateway configuration. Compiles the
    /// rollup table and builds the pooled backend client; both failure
    /// modes are fatal at startup.
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let rollups = RollupTable::compile(&config)?;
        let base = Url::parse(&config.prometheus_url)?;
        let backend = PromClient::new(
            base,
            config.prometheus_max_body,
            Duration::from_secs(config.request_timeout_seconds),
        )?;
        Ok(AppState {
            config,
            backend,
            rollups,
        })
    }
}

/// Create router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics/find/", get(find::handle))
        .route("/render/", get(render::handle))
        .route("/check_health", get(check_health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn check_health() -> &'static str {
    "ok~"
}

/// Gateway-level request errors; fan-out sub-target failures never reach
/// this type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        }
    }
}

/// Wrapper serializing a prost message as `application/x-protobuf`.
pub struct Protobuf<T>(pub T);

impl<T: Message> IntoResponse for Protobuf<T> {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, "application/x-protobuf")],
            self.0.encode_to_vec(),
        )
            .into_response()
    }
}
