//! Queue registry handlers.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::QueueListResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `GET /queues`: List registered queues.
///
/// # Errors
///
/// Returns [`RelayError::RegistryUnavailable`] if the registry cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/queues",
    tag = "Queues",
    summary = "List registered queues",
    description = "Returns every queue name currently in the registry. Each running consumer worker owns exactly one.",
    responses(
        (status = 200, description = "Registered queues", body = QueueListResponse),
        (status = 503, description = "Registry unavailable", body = ErrorResponse),
    )
)]
pub async fn list_queues(
    State(state): State<AppState>,
) -> Result<Json<QueueListResponse>, RelayError> {
    let queues: Vec<_> = state.ctx.registry.list_active().await?.into_iter().collect();
    Ok(Json(QueueListResponse {
        count: queues.len(),
        queues,
    }))
}

/// Queue routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/queues", get(list_queues))
}
