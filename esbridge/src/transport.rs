//! HTTP transport
//!
//! Builds URLs against the resolved endpoint, sends one request and hands back
//! the raw status and body. Interpreting the body is the caller's job.

use crate::endpoint::EndpointResolver;
use crate::error::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    /// Newline-delimited JSON, as `_bulk` expects
    Ndjson(String),
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an engine error
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let err = Error::from_engine_response(self.status, &self.body);
        if let Error::Engine { error_type, .. } = &err {
            warn!(status = self.status, error_type = %error_type, "Engine request failed");
        }
        Err(err)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[derive(Clone)]
pub struct Transport {
    http: Client,
    resolver: Arc<dyn EndpointResolver>,
}

impl Transport {
    pub fn new(http: Client, resolver: Arc<dyn EndpointResolver>) -> Self {
        Self { http, resolver }
    }

    /// Send to `/{segments...}?{query}`; each segment is percent-encoded
    pub async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<RequestBody>,
    ) -> Result<RawResponse> {
        let mut url = self.resolver.resolve().await?.base_url()?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Config("endpoint URL cannot be a base".to_string()))?;
            path.pop_if_empty();
            path.extend(segments.iter().filter(|s| !s.is_empty()));
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        self.execute(method, url, body).await
    }

    /// Send to a caller-supplied path, which may carry a query string
    pub async fn send_path(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<RawResponse> {
        let base = self.resolver.resolve().await?.base_url()?;
        let url = base.join(&format!("/{}", path.trim_start_matches('/')))?;
        self.execute(method, url, body).await
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody>,
    ) -> Result<RawResponse> {
        let mut request = self.http.request(method.clone(), url.clone());
        request = match body {
            Some(RequestBody::Json(value)) => request.json(&value),
            Some(RequestBody::Ndjson(lines)) => request
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(lines),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            warn!(%method, %url, "Request failed: {}", e);
            e
        })?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(%method, %url, status, "Engine request");

        Ok(RawResponse { status, body })
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}
