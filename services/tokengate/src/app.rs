//! Gateway HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router over the configured token routes and defines the
//! shared state injected into handlers.
//!
//! # Notes
//! Route paths come from configuration, so the router is assembled per
//! process rather than from fixed paths.
use crate::api;
use crate::auth;
use crate::auth::signer::{Hs256Signer, TokenSigner};
use crate::config::RouteConfig;
use crate::forward::DownstreamForwarder;
use crate::observability;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Read-only state shared by every request. Nothing in it changes after
/// startup, so handlers never synchronize.
pub struct AppState<S = Hs256Signer> {
    pub signer: Arc<S>,
    pub forwarder: DownstreamForwarder,
    pub remote_url: Arc<str>,
    pub request_token_data: Arc<serde_yaml::Value>,
    pub routes: RouteConfig,
}

// Derived Clone would demand `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            signer: Arc::clone(&self.signer),
            forwarder: self.forwarder.clone(),
            remote_url: Arc::clone(&self.remote_url),
            request_token_data: Arc::clone(&self.request_token_data),
            routes: self.routes.clone(),
        }
    }
}

pub fn build_router<S: TokenSigner>(state: AppState<S>) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri().path(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    let routes = state.routes.clone();
    Router::new()
        .route(
            api::system::HEALTH_ROUTE,
            axum::routing::get(api::system::system_health),
        )
        .route(
            &routes.get_token,
            axum::routing::post(auth::exchange::issue_token::<S>),
        )
        .route(
            &routes.check_token,
            axum::routing::get(auth::verify::check_token::<S>),
        )
        .layer(trace_layer)
        .with_state(state)
}
