//! Shared test utilities for carbongate integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use carbongate::api::{create_router, AppState};
use carbongate::config::GatewayConfig;
use prost::Message;

/// Gateway configuration pointed at a mock backend.
pub fn gateway_config(backend_url: &str) -> GatewayConfig {
    GatewayConfig {
        prometheus_url: backend_url.to_string(),
        ..GatewayConfig::default()
    }
}

/// Build the gateway router around the given configuration.
pub fn gateway_app(config: GatewayConfig) -> axum::Router {
    let state = Arc::new(AppState::new(config).unwrap());
    create_router(state)
}

/// A carbonapi-style GET request carrying a protobuf body.
pub fn proto_request<M: Message>(uri: &str, message: &M) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::from(message.encode_to_vec()))
        .unwrap()
}

pub async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}
