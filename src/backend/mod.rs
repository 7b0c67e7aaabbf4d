//! HTTP client for the Prometheus-compatible backend.
//!
//! One pooled client serves every fan-out branch. Response bodies are
//! stream-read against a configured cap: the backend happily returns
//! hundreds of megabytes for a careless selector, and a truncated decode
//! is strictly worse than a dropped sub-target.

pub mod response;

use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use url::Url;

pub use response::{MatrixPair, MatrixResponse, MatrixResult, MatrixSeries, ValuesResponse};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("backend response exceeded {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
}

/// Time range and selector constraining a label-values lookup.
#[derive(Debug, Clone, Copy)]
pub struct LabelValuesRange<'a> {
    pub start: i64,
    pub stop: i64,
    pub selector: &'a str,
}

/// Client for the two Prometheus API endpoints the gateway fans out to.
#[derive(Debug, Clone)]
pub struct PromClient {
    http: reqwest::Client,
    base: Url,
    max_body: usize,
}

impl PromClient {
    /// `timeout` is a backstop only; the expected liveness source is the
    /// caller dropping its request future.
    pub fn new(base: Url, max_body: usize, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut base = base;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(PromClient {
            http,
            base,
            max_body,
        })
    }

    /// `GET /api/v1/label/<label>/values`, optionally constrained by a
    /// time range and match selector. An unconstrained lookup is the find
    /// fast path; the backend serves it straight from its label index.
    pub async fn label_values(
        &self,
        label: &str,
        range: Option<LabelValuesRange<'_>>,
    ) -> Result<Vec<String>, BackendError> {
        let mut url = self.base.join(&format!("api/v1/label/{label}/values"))?;
        if let Some(range) = range {
            url.query_pairs_mut()
                .append_pair("start", &range.start.to_string())
                .append_pair("end", &range.stop.to_string())
                .append_pair("match[]", range.selector);
        }
        let body = self.get_capped(url).await?;
        let parsed: ValuesResponse = serde_json::from_slice(&body)?;
        Ok(parsed.data)
    }

    /// `GET /api/v1/query_range`. `max_lookback` pins the backend's
    /// staleness window to the query step, mirroring how Graphite
    /// downsamples inside fixed windows.
    pub async fn query_range(
        &self,
        query: &str,
        start: i64,
        stop: i64,
        step: i64,
    ) -> Result<MatrixResult, BackendError> {
        let window = format!("{step}s");
        let mut url = self.base.join("api/v1/query_range")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("start", &start.to_string())
            .append_pair("end", &stop.to_string())
            .append_pair("step", &window)
            .append_pair("max_lookback", &window);
        let body = self.get_capped(url).await?;
        let parsed: MatrixResponse = serde_json::from_slice(&body)?;
        Ok(parsed.data)
    }

    async fn get_capped(&self, url: Url) -> Result<Vec<u8>, BackendError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status));
        }
        let mut body = Vec::with_capacity(8 * 1024);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > self.max_body {
                return Err(BackendError::BodyTooLarge {
                    limit: self.max_body,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
