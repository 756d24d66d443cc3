use axum::{extract::State, http::StatusCode, Json};
use tracing::warn;

use crate::api::{state::AppState, types::*};

/// GET /health -- liveness; never touches the database
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
    })
}

/// GET /ready -- readiness probe, pings the store
pub async fn readiness_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let (status, code, database) = match state.store.ping().await {
        Ok(()) => (HealthStatus::Healthy, StatusCode::OK, "connected".to_string()),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (
                HealthStatus::Unhealthy,
                StatusCode::SERVICE_UNAVAILABLE,
                "disconnected".to_string(),
            )
        }
    };

    (
        code,
        Json(ReadinessResponse {
            status,
            database,
            model_backend: state.classifier.backend().to_string(),
            uptime_secs: state.uptime_seconds(),
        }),
    )
}
