//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::HealthResponse;
use crate::app_state::AppState;

/// `GET /health`: Relay health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns relay health, version, broker connectivity, and whether shutdown is in progress. Answers 503 once the broker is down or shutdown has begun.",
    responses(
        (status = 200, description = "Relay is healthy", body = HealthResponse),
        (status = 503, description = "Relay is degraded or shutting down", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let broker_connected = !state.ctx.broker.is_closed().await;
    let shutting_down = state.ctx.cancel.is_cancelled();
    let (code, status) = match (broker_connected, shutting_down) {
        (_, true) => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
        (false, false) => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        (true, false) => (StatusCode::OK, "healthy"),
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            broker_connected,
            shutting_down,
            subscribers: state.ctx.publisher.subscriber_count().await,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
