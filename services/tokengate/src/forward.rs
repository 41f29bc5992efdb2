//! HTTP client for the configured downstream service.
//!
//! # Purpose
//! Deliver the caller's raw request body to the remote endpoint, authenticated
//! with the gateway's signed assertion, and hand back the raw status and body.
//!
//! # Notes
//! The forwarder never interprets the response status; the exchange
//! orchestrator decides what counts as success. Only transport level problems
//! (connect, timeout, truncated body) surface as [`NetworkError`].
use crate::auth::signer::SignedToken;
use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Upper bound on a single downstream call, body included.
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
#[error("{context}: {source}")]
pub struct NetworkError {
    context: &'static str,
    #[source]
    source: reqwest::Error,
}

impl NetworkError {
    pub fn is_timeout(&self) -> bool {
        self.source.is_timeout()
    }
}

#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct DownstreamForwarder {
    client: reqwest::Client,
}

impl DownstreamForwarder {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(FORWARD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST `raw_body` to `remote_url` with `assertion` as the bearer credential.
    pub async fn forward(
        &self,
        remote_url: &str,
        raw_body: Bytes,
        assertion: &SignedToken,
    ) -> Result<ForwardResponse, NetworkError> {
        let response = self
            .client
            .post(remote_url)
            .bearer_auth(assertion.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(raw_body)
            .send()
            .await
            .map_err(|source| NetworkError {
                context: "remote request failed",
                source,
            })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|source| NetworkError {
            context: "remote body read failed",
            source,
        })?;
        tracing::debug!(%status, body_len = body.len(), "downstream responded");
        Ok(ForwardResponse { status, body })
    }
}
