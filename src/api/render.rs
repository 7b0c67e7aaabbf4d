//! `/render/` — fetch dense frames for each target.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use futures::future::join_all;
use prost::Message;

use super::{ApiError, AppState, Protobuf, MAX_TARGET_LEN};
use crate::carbonapi::{FetchRequest, FetchResponse, MultiFetchRequest, MultiFetchResponse};
use crate::translate::{
    align_to_request, build_selector, convert_target, fill_dense, metric_to_target, select_step,
};

pub async fn handle(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = MultiFetchRequest::decode(body.as_ref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let fetches = request
        .metrics
        .iter()
        .map(|fetch| render_target(&state, fetch));
    let metrics: Vec<FetchResponse> = join_all(fetches).await.into_iter().flatten().collect();

    Ok(Protobuf(MultiFetchResponse { metrics }))
}

async fn render_target(state: &AppState, request: &FetchRequest) -> Vec<FetchResponse> {
    let began = Instant::now();
    let path = request.path_expression.as_str();

    if path.len() > MAX_TARGET_LEN {
        tracing::error!(path_len = path.len(), "render path too long");
        return Vec::new();
    }

    let (head, filters) = match convert_target(path, true) {
        Ok(converted) => converted,
        Err(err) => {
            tracing::warn!(path = %path, error = %err, "unconvertible render target");
            return Vec::new();
        }
    };
    let selector = build_selector(&head, &filters);

    let step = select_step(
        request.start_time,
        request.stop_time,
        request.max_data_points,
        state.config.statsd_flush_interval,
    );
    let rollup_func = state.rollups.func_for(path);
    let query = format!("{rollup_func}({selector}[{step}s])");

    let matrix = match state
        .backend
        .query_range(&query, request.start_time, request.stop_time, step)
        .await
    {
        Ok(matrix) => matrix,
        Err(err) => {
            tracing::error!(path = %path, error = %err, "range query failed");
            return Vec::new();
        }
    };

    let mut responses = Vec::with_capacity(matrix.result.len());
    for series in matrix.result {
        // The backend sometimes emits series with no samples at all.
        if series.values.is_empty() {
            continue;
        }

        let name = metric_to_target(&head, &series.metric);
        if name.is_empty() {
            tracing::error!(path = %path, metric = ?series.metric, "metric name mismatch, dropping series");
            continue;
        }

        let samples: Vec<(f64, f64)> = series
            .values
            .iter()
            .map(|pair| (pair.timestamp, pair.value))
            .collect();
        let frame = align_to_request(
            fill_dense(&samples, step),
            request.start_time,
            request.stop_time,
        );

        responses.push(FetchResponse {
            name,
            path_expression: request.path_expression.clone(),
            // The step already keeps point counts inside max_data_points,
            // so carbonapi's own consolidation never runs.
            consolidation_func: "avg".to_string(),
            start_time: frame.start,
            stop_time: frame.stop,
            step_time: frame.step,
            x_files_factor: 0.0,
            high_precision_timestamps: false,
            values: frame.values,
            applied_functions: Vec::new(),
            request_start_time: request.start_time,
            request_stop_time: request.stop_time,
        });
    }

    tracing::info!(
        path = %path,
        series = responses.len(),
        step,
        elapsed_ms = began.elapsed().as_millis() as u64,
        "render target complete"
    );
    responses
}
