//! Health check handlers and response types.

use crate::state::HealthState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use dossier_infra::CircuitSnapshot;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` while an upload or status circuit is open.
    pub status: String,
    pub storage: String,
    pub circuits: Vec<CircuitSnapshot>,
}

/// Liveness trial - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Storage backend and breaker states. Answers 503 while requests against
/// storage are being failed fast.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Storage reachable as far as the breakers know", body = HealthResponse),
        (status = 503, description = "An upload or status circuit is open", body = HealthResponse)
    )
)]
pub async fn health_check(State(health): State<HealthState>) -> impl IntoResponse {
    let degraded = health.breakers.any_serving_open();
    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        storage: health.backend.to_string(),
        circuits: health.breakers.snapshots(),
    };

    if degraded {
        tracing::warn!("Health check reports open circuit");
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    } else {
        (StatusCode::OK, Json(response))
    }
}
