//! Liveness and readiness probes.
//!
//! - `/health`: process is up, no dependency checks
//! - `/ready`: the user store answers

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

/// Liveness probe.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe. Failure detail is logged, not returned.
#[tracing::instrument(skip_all, name = "session.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready".to_string(),
                database: "healthy".to_string(),
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "session.health", error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready".to_string(),
                    database: "unhealthy".to_string(),
                }),
            )
        }
    }
}
