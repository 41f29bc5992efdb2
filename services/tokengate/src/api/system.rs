//! Liveness endpoint.
//!
//! Health checks must stay fast and side-effect free, so this handler never
//! contacts the downstream service.
use crate::api::types::HealthStatus;
use axum::Json;

pub const HEALTH_ROUTE: &str = "/health";

pub async fn system_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}
