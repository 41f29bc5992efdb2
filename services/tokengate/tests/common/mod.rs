#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use std::net::SocketAddr;
use std::sync::Arc;
use tokengate::app::{AppState, build_router};
use tokengate::auth::signer::{ExpiryPolicy, Hs256Signer, Secret};
use tokengate::config::RouteConfig;
use tokengate::forward::DownstreamForwarder;
use tokio::sync::mpsc;

pub const SECRET: &str = "integration-secret-0123456789abcdef";
pub const OTHER_SECRET: &str = "another-secret-fedcba9876543210xyz";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn signer(secret: &str, expiry: ExpiryPolicy) -> Hs256Signer {
    Hs256Signer::new(Secret::new(secret).expect("secret"), expiry)
}

/// What the stub downstream service saw on one request.
#[derive(Debug)]
pub struct Received {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Start a downstream stub on `/remote` that answers every POST with the
/// given status and body and reports each request it receives.
pub async fn spawn_downstream(
    status: StatusCode,
    body: &'static str,
) -> (String, mpsc::UnboundedReceiver<Received>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/remote",
        post(move |headers: HeaderMap, request_body: Bytes| {
            let tx = tx.clone();
            async move {
                let header = |name: axum::http::HeaderName| {
                    headers
                        .get(name)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string)
                };
                let _ = tx.send(Received {
                    authorization: header(axum::http::header::AUTHORIZATION),
                    content_type: header(axum::http::header::CONTENT_TYPE),
                    body: request_body,
                });
                (status, body)
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind downstream");
    let addr: SocketAddr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve downstream");
    });
    (format!("http://{addr}/remote"), rx)
}

pub fn gateway_state(
    remote_url: &str,
    static_data: serde_yaml::Value,
    expiry: ExpiryPolicy,
) -> AppState {
    AppState {
        signer: Arc::new(signer(SECRET, expiry)),
        forwarder: DownstreamForwarder::new().expect("client"),
        remote_url: Arc::from(remote_url),
        request_token_data: Arc::new(static_data),
        routes: RouteConfig::default(),
    }
}

pub fn gateway(remote_url: &str, static_data: serde_yaml::Value) -> Router {
    build_router(gateway_state(remote_url, static_data, ExpiryPolicy::Reject))
}
