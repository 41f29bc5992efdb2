//! Token gateway HTTP service entry point.
//!
//! # Purpose
//! Loads configuration, wires the signer and downstream client, and serves the
//! token routes until interrupted.
//!
//! # Notes
//! Any configuration problem aborts startup before the listener is bound.
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use tokengate::app::{AppState, build_router};
use tokengate::auth::signer::Hs256Signer;
use tokengate::config::GatewayConfig;
use tokengate::forward::DownstreamForwarder;
use tokengate::observability;

const SERVICE_NAME: &str = "tokengate";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env_or_yaml().context("load gateway config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: GatewayConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability(SERVICE_NAME, config.debug);
    let state = build_state(&config)?;

    let metrics_task = config.metrics_bind.map(|metrics_addr| {
        tracing::info!(%metrics_addr, "metrics listening");
        tokio::spawn(async move {
            let result = observability::serve_metrics(
                metrics_handle,
                metrics_addr,
                std::future::pending(),
            )
            .await;
            if let Err(err) = result {
                tracing::warn!(error = %err, "metrics server stopped");
            }
        })
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!(
        %addr,
        remote = %config.remote,
        get_token_route = %config.routes.get_token,
        check_token_route = %config.routes.check_token,
        "token gateway listening"
    );

    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {
            tracing::info!("shutdown requested");
        }
    }

    if let Some(task) = metrics_task {
        task.abort();
        let _ = task.await;
    }
    Ok(())
}

fn build_state(config: &GatewayConfig) -> anyhow::Result<AppState> {
    let forwarder = DownstreamForwarder::new().context("build downstream client")?;
    Ok(AppState {
        signer: Arc::new(Hs256Signer::new(
            config.secret.clone(),
            config.expiry_policy,
        )),
        forwarder,
        remote_url: Arc::from(config.remote.as_str()),
        request_token_data: Arc::new(config.request_token_data.clone()),
        routes: config.routes.clone(),
    })
}
