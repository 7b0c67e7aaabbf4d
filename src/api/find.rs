//! `/metrics/find/` — expand one hierarchy level per glob target.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use futures::future::join_all;
use prost::Message;

use super::{ApiError, AppState, Protobuf, MAX_TARGET_LEN};
use crate::backend::LabelValuesRange;
use crate::carbonapi::{GlobMatch, GlobResponse, MultiGlobRequest, MultiGlobResponse};
use crate::translate::{build_selector, convert_target, next_level};

pub async fn handle(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = MultiGlobRequest::decode(body.as_ref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // One concurrent lookup per target. Dropping this future (client gone)
    // drops every in-flight backend call with it; failed targets are
    // simply absent from the response.
    let lookups = request
        .metrics
        .iter()
        .map(|target| find_target(&state, target, request.start_time, request.stop_time));
    let metrics: Vec<GlobResponse> = join_all(lookups).await.into_iter().flatten().collect();

    Ok(Protobuf(MultiGlobResponse { metrics }))
}

async fn find_target(
    state: &AppState,
    target: &str,
    start: i64,
    stop: i64,
) -> Option<GlobResponse> {
    let began = Instant::now();

    // A bare `*` would enumerate every series in the backend.
    if target == "*" {
        tracing::warn!(path = %target, "refusing to enumerate the whole backend");
        return None;
    }
    // Oversized targets usually mean a Grafana variable's All option
    // expanded into every value.
    if target.len() > MAX_TARGET_LEN {
        tracing::error!(path_len = target.len(), "find path too long");
        return None;
    }

    let (head, filters) = match convert_target(target, false) {
        Ok(converted) => converted,
        Err(err) => {
            tracing::warn!(path = %target, error = %err, "unconvertible find target");
            return None;
        }
    };
    let (prefix, label, fast) = next_level(target);

    // Two-segment targets need no filter beyond the name, and the backend
    // answers an unconstrained label lookup straight from its index.
    let selector;
    let range = if fast {
        None
    } else {
        selector = build_selector(&head, &filters);
        Some(LabelValuesRange {
            start,
            stop,
            selector: &selector,
        })
    };

    let values = match state.backend.label_values(&label, range).await {
        Ok(values) => values,
        Err(err) => {
            tracing::error!(path = %target, error = %err, "label values request failed");
            return None;
        }
    };

    let matches = values
        .into_iter()
        .map(|value| GlobMatch {
            path: format!("{prefix}{value}"),
            is_leaf: false,
        })
        .collect();

    tracing::info!(
        path = %target,
        elapsed_ms = began.elapsed().as_millis() as u64,
        "find target resolved"
    );
    Some(GlobResponse {
        name: target.to_string(),
        matches,
    })
}
