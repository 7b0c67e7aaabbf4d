//! Prometheus query proxy.
//!
//! A catch-all reverse proxy in front of the backend's HTTP API. The only
//! surgery performed is on `query=` and `match[]=` parameters, which run
//! through the query rewriter so dotted Graphite names reach the backend
//! as labelled selectors. Everything else — method, path, headers, body,
//! other parameters — forwards verbatim.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{HeaderMap, HeaderName, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::ProxyConfig;
use crate::translate::convert_query;

/// Largest request body forwarded upstream. Prometheus API requests are
/// form-encoded queries; multi-megabyte bodies are garbage.
const MAX_FORWARD_BODY: usize = 8 * 1024 * 1024;

pub struct ProxyState {
    http: reqwest::Client,
    base: Url,
}

impl ProxyState {
    pub fn new(config: &ProxyConfig) -> anyhow::Result<Self> {
        let base = Url::parse(&config.prometheus_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        Ok(ProxyState { http, base })
    }
}

pub fn create_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/check_health", get(check_health))
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn check_health() -> &'static str {
    "ok~"
}

async fn forward(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    match forward_inner(&state, request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "proxying request failed");
            (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
        }
    }
}

async fn forward_inner(state: &ProxyState, request: Request) -> anyhow::Result<Response> {
    let (parts, body) = request.into_parts();

    let mut url = state.base.clone();
    url.set_path(&joined_path(state.base.path(), parts.uri.path()));
    url.set_query(rewrite_query_string(parts.uri.query().unwrap_or("")).as_deref());

    let body = axum::body::to_bytes(body, MAX_FORWARD_BODY).await?;

    let upstream = state
        .http
        .request(parts.method, url)
        .headers(forwardable_headers(&parts.headers))
        .body(body)
        .send()
        .await?;

    let mut response = Response::builder().status(upstream.status());
    if let Some(headers) = response.headers_mut() {
        *headers = forwardable_headers(upstream.headers());
    }
    Ok(response.body(Body::from_stream(upstream.bytes_stream()))?)
}

/// Rewrite `query=` (terminal) and `match[]=` (non-terminal) parameters.
/// A parameter the rewriter cannot parse is forwarded as written.
fn rewrite_query_string(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let mut rewritten = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "query" | "match[]" => match convert_query(&value, key == "query") {
                Ok(converted) => {
                    tracing::info!(from = %value, to = %converted, "rewrote query");
                    rewritten.append_pair(&key, &converted);
                }
                Err(err) => {
                    tracing::error!(query = %value, error = %err, "query rewrite failed, forwarding unchanged");
                    rewritten.append_pair(&key, &value);
                }
            },
            _ => {
                rewritten.append_pair(&key, &value);
            }
        }
    }
    Some(rewritten.finish())
}

fn joined_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// Hop-by-hop headers stay on their own hop; length and framing are
// recomputed by the HTTP client.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    const HOP_BY_HOP: [HeaderName; 4] = [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION];
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !HOP_BY_HOP.contains(name) {
            forwarded.append(name, value.clone());
        }
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_query_and_match_params() {
        let rewritten = rewrite_query_string("query=a.b&match%5B%5D=a.b&start=1").unwrap();
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(rewritten.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            pairs,
            vec![
                (
                    "query".to_string(),
                    r#"a{__a_g1__="b", __a_g2__=""}"#.to_string()
                ),
                ("match[]".to_string(), r#"a{__a_g1__="b"}"#.to_string()),
                ("start".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn unparseable_query_forwards_unchanged() {
        let rewritten = rewrite_query_string("query=sum%28").unwrap();
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(rewritten.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(pairs, vec![("query".to_string(), "sum(".to_string())]);
    }

    #[test]
    fn empty_query_string_stays_absent() {
        assert_eq!(rewrite_query_string(""), None);
    }

    #[test]
    fn paths_join_with_single_slash() {
        assert_eq!(joined_path("/", "/api/v1/query"), "/api/v1/query");
        assert_eq!(joined_path("/vm", "api/v1/query"), "/vm/api/v1/query");
        assert_eq!(joined_path("/vm/", "/api/v1/query"), "/vm/api/v1/query");
    }
}
