//! Token check endpoint handler.
use crate::api::error::{ApiError, api_unauthorized};
use crate::app::AppState;
use crate::auth::claims::ClaimSet;
use crate::auth::signer::TokenSigner;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::Deserialize;

pub const ACCESS_TOKEN_PARAM: &str = "access_token";
pub const NO_TOKEN_MESSAGE: &str = "no token present in request";

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub access_token: Option<String>,
}

/// Find the presented credential: an `Authorization: Bearer` header first,
/// then the `access_token` query parameter. Empty values count as absent.
pub fn extract_bearer<'a>(headers: &'a HeaderMap, query: Option<&'a TokenQuery>) -> Option<&'a str> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty());
    if from_header.is_some() {
        return from_header;
    }
    query
        .and_then(|query| query.access_token.as_deref())
        .filter(|token| !token.is_empty())
}

pub async fn check_token<S: TokenSigner>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    query: Option<Query<TokenQuery>>,
) -> Result<Json<ClaimSet>, ApiError> {
    let query = query.map(|Query(value)| value);
    let Some(token) = extract_bearer(&headers, query.as_ref()) else {
        metrics::counter!("tokengate_check_total", "outcome" => "missing").increment(1);
        return Err(api_unauthorized(NO_TOKEN_MESSAGE));
    };

    match state.signer.verify(token) {
        Ok(claims) => {
            metrics::counter!("tokengate_check_total", "outcome" => "valid").increment(1);
            Ok(Json(claims))
        }
        Err(err) => {
            metrics::counter!("tokengate_check_total", "outcome" => err.reason.as_str())
                .increment(1);
            tracing::debug!(reason = err.reason.as_str(), "token rejected");
            Err(api_unauthorized(&err.to_string()))
        }
    }
}
