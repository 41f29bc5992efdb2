//! API error type and response helpers.
//!
//! # Purpose and responsibility
//! Keeps error response shapes uniform across the gateway's endpoints.
//!
//! # Key invariants
//! - Exchange failures are always 500 and always name what went wrong in
//!   `message`.
//! - Verification failures are always 401 with an `error` string.
//!
//! # Security considerations
//! - Error strings come from typed errors that never include the secret or a
//!   presented token.
use crate::api::types::ErrorBody;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::fmt::Display;

/// Structured API error returned by handlers.
///
/// `status` is the HTTP status sent to the caller; `body` is serialized as
/// JSON.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build a 500 carrying a message and the underlying error text.
pub fn api_internal(message: &str, err: &dyn Display) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorBody {
            message: Some(message.to_string()),
            error: Some(err.to_string()),
            status: None,
        },
    }
}

/// Build a 500 reporting the status the downstream service answered with.
pub fn api_upstream_status(message: &str, upstream: StatusCode) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorBody {
            message: Some(message.to_string()),
            error: None,
            status: Some(upstream.as_u16()),
        },
    }
}

/// Build a 401 for a missing or rejected bearer credential.
pub fn api_unauthorized(error: &str) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        body: ErrorBody {
            message: None,
            error: Some(error.to_string()),
            status: None,
        },
    }
}
