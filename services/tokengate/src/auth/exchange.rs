//! Token exchange endpoint handler.
//!
//! # Purpose
//! Mints an assertion over the configured static data, forwards the caller's
//! body to the downstream service under that assertion, and re-signs the
//! downstream JSON object as the caller's token.
//!
//! # Key invariants
//! - The caller's body reaches the downstream service byte for byte.
//! - Only a 200 downstream answer whose body is a JSON object yields a token.
//! - Every failure is reported as a 500 naming the stage that failed; no
//!   partial token is ever returned.
use crate::api::error::{ApiError, api_internal, api_upstream_status};
use crate::api::types::TokenResponse;
use crate::app::AppState;
use crate::auth::claims::{
    RemoteResponse, build_outbound_assertion_claims, build_response_claims, now_epoch_seconds,
};
use crate::auth::signer::{SignedToken, SigningError, TokenSigner};
use crate::forward::{DownstreamForwarder, NetworkError};
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

/// Largest caller body the gateway will buffer before forwarding.
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStage {
    SignAssertion,
    ReadRequestBody,
    Forward,
    CheckStatus,
    ParseJson,
    SignResponse,
}

impl ExchangeStage {
    /// Message reported to the caller when this stage fails.
    pub fn message(self) -> &'static str {
        match self {
            Self::SignAssertion => "could not generate remote assertion",
            Self::ReadRequestBody => "unable to read request body",
            Self::Forward => "remote post failure",
            Self::CheckStatus => "remote post status failure",
            Self::ParseJson => "can not parse remote json",
            Self::SignResponse => "can not generate return token",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignAssertion => "sign_assertion",
            Self::ReadRequestBody => "read_request_body",
            Self::Forward => "forward",
            Self::CheckStatus => "check_status",
            Self::ParseJson => "parse_json",
            Self::SignResponse => "sign_response",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("sign assertion: {0}")]
    SignAssertion(#[source] SigningError),
    #[error("read request body: {0}")]
    ReadRequestBody(#[source] axum::Error),
    #[error(transparent)]
    Forward(#[from] NetworkError),
    #[error("downstream answered {0}")]
    UpstreamStatus(StatusCode),
    #[error("parse downstream json: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("sign response token: {0}")]
    SignResponse(#[source] SigningError),
}

impl ExchangeError {
    pub fn stage(&self) -> ExchangeStage {
        match self {
            Self::SignAssertion(_) => ExchangeStage::SignAssertion,
            Self::ReadRequestBody(_) => ExchangeStage::ReadRequestBody,
            Self::Forward(_) => ExchangeStage::Forward,
            Self::UpstreamStatus(_) => ExchangeStage::CheckStatus,
            Self::Parse(_) => ExchangeStage::ParseJson,
            Self::SignResponse(_) => ExchangeStage::SignResponse,
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        let message = err.stage().message();
        match &err {
            ExchangeError::UpstreamStatus(status) => api_upstream_status(message, *status),
            ExchangeError::SignAssertion(source) | ExchangeError::SignResponse(source) => {
                api_internal(message, source)
            }
            ExchangeError::ReadRequestBody(source) => api_internal(message, source),
            ExchangeError::Forward(source) => api_internal(message, source),
            ExchangeError::Parse(source) => api_internal(message, source),
        }
    }
}

/// Run one exchange end to end. Stages run strictly in order and the first
/// failure ends the exchange.
pub async fn run_exchange<S, D>(
    signer: &S,
    forwarder: &DownstreamForwarder,
    remote_url: &str,
    static_data: &D,
    body: Body,
) -> Result<SignedToken, ExchangeError>
where
    S: TokenSigner,
    D: Serialize,
{
    let assertion_claims = build_outbound_assertion_claims(static_data, now_epoch_seconds());
    let assertion = signer
        .sign(&assertion_claims)
        .map_err(ExchangeError::SignAssertion)?;

    let raw_body = axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES)
        .await
        .map_err(ExchangeError::ReadRequestBody)?;

    let response = forwarder.forward(remote_url, raw_body, &assertion).await?;
    if response.status != StatusCode::OK {
        return Err(ExchangeError::UpstreamStatus(response.status));
    }

    let remote: RemoteResponse =
        serde_json::from_slice(&response.body).map_err(ExchangeError::Parse)?;

    let response_claims = build_response_claims(remote, now_epoch_seconds());
    signer
        .sign(&response_claims)
        .map_err(ExchangeError::SignResponse)
}

pub async fn issue_token<S: TokenSigner>(
    State(state): State<AppState<S>>,
    body: Body,
) -> Result<Json<TokenResponse>, ApiError> {
    let result = run_exchange(
        state.signer.as_ref(),
        &state.forwarder,
        &state.remote_url,
        state.request_token_data.as_ref(),
        body,
    )
    .await;

    match result {
        Ok(token) => {
            metrics::counter!("tokengate_exchange_total", "outcome" => "issued").increment(1);
            Ok(Json(TokenResponse {
                token: token.into_string(),
            }))
        }
        Err(err) => {
            let stage = err.stage();
            metrics::counter!("tokengate_exchange_total", "outcome" => stage.as_str())
                .increment(1);
            tracing::error!(stage = stage.as_str(), error = %err, "token exchange failed");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signer::{ExpiryPolicy, Hs256Signer, Secret};
    use axum::Router;
    use axum::routing::post;
    use std::net::SocketAddr;

    fn signer() -> Hs256Signer {
        Hs256Signer::new(
            Secret::new(b"exchange-test-secret-0123456789abcdef".to_vec()).expect("secret"),
            ExpiryPolicy::Reject,
        )
    }

    async fn spawn_downstream(status: StatusCode, body: &'static str) -> SocketAddr {
        let app = Router::new().route("/remote", post(move || async move { (status, body) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        addr
    }

    #[test]
    fn stage_messages_match_error_variants() {
        let err = ExchangeError::UpstreamStatus(StatusCode::NOT_FOUND);
        assert_eq!(err.stage(), ExchangeStage::CheckStatus);
        assert_eq!(err.stage().message(), "remote post status failure");

        let parse = serde_json::from_slice::<RemoteResponse>(b"[]").expect_err("array");
        let err = ExchangeError::Parse(parse);
        assert_eq!(err.stage().message(), "can not parse remote json");
        assert_eq!(err.stage().as_str(), "parse_json");
    }

    #[test]
    fn upstream_status_maps_to_status_field() {
        let api: ApiError = ExchangeError::UpstreamStatus(StatusCode::FORBIDDEN).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.body.status, Some(403));
        assert_eq!(api.body.error, None);
    }

    #[tokio::test]
    async fn exchange_wraps_downstream_object() {
        let addr = spawn_downstream(StatusCode::OK, r#"{"foo":"bar"}"#).await;
        let signer = signer();
        let forwarder = DownstreamForwarder::new().expect("client");
        let token = run_exchange(
            &signer,
            &forwarder,
            &format!("http://{addr}/remote"),
            &serde_json::json!({"client": "test"}),
            Body::from("{}"),
        )
        .await
        .expect("token");

        let claims = signer.verify(token.as_str()).expect("verify");
        assert_eq!(claims.data, serde_json::json!({"foo": "bar"}));
    }

    #[tokio::test]
    async fn exchange_stops_at_first_failing_stage() {
        let signer = signer();
        let forwarder = DownstreamForwarder::new().expect("client");

        let addr = spawn_downstream(StatusCode::BAD_GATEWAY, r#"{"foo":"bar"}"#).await;
        let err = run_exchange(
            &signer,
            &forwarder,
            &format!("http://{addr}/remote"),
            &serde_json::Value::Null,
            Body::empty(),
        )
        .await
        .expect_err("status");
        assert!(matches!(err, ExchangeError::UpstreamStatus(StatusCode::BAD_GATEWAY)));

        let addr = spawn_downstream(StatusCode::OK, "not json").await;
        let err = run_exchange(
            &signer,
            &forwarder,
            &format!("http://{addr}/remote"),
            &serde_json::Value::Null,
            Body::empty(),
        )
        .await
        .expect_err("parse");
        assert_eq!(err.stage(), ExchangeStage::ParseJson);
    }

    #[tokio::test]
    async fn unsignable_static_data_fails_before_forwarding() {
        let mut data = serde_yaml::Mapping::new();
        let key = serde_yaml::Value::Sequence(vec![1.into(), 2.into()]);
        data.insert(key, serde_yaml::Value::from("pair"));
        let err = run_exchange(
            &signer(),
            &DownstreamForwarder::new().expect("client"),
            "http://127.0.0.1:1/unreachable",
            &serde_yaml::Value::Mapping(data),
            Body::empty(),
        )
        .await
        .expect_err("sign");
        assert_eq!(err.stage(), ExchangeStage::SignAssertion);
    }

    #[tokio::test]
    async fn oversized_body_is_read_failure() {
        let body = Body::from(vec![b'a'; MAX_REQUEST_BODY_BYTES + 1]);
        let err = run_exchange(
            &signer(),
            &DownstreamForwarder::new().expect("client"),
            "http://127.0.0.1:1/unreachable",
            &serde_json::Value::Null,
            body,
        )
        .await
        .expect_err("too large");
        assert_eq!(err.stage(), ExchangeStage::ReadRequestBody);
    }
}
