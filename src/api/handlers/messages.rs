//! Outbound message handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{SendMessageRequest, SendMessageResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `POST /messages`: Broadcast a message to every registered queue.
///
/// # Errors
///
/// Returns [`RelayError`] if the payload is not a JSON object, the registry
/// cannot be listed, a bind fails, or the publish fails or times out.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "Messages",
    summary = "Send a message",
    description = "Binds every registered queue to the fan-out exchange, then publishes the JSON object once. Nothing is retried.",
    request_body = SendMessageRequest,
    responses(
        (status = 202, description = "Message published", body = SendMessageResponse),
        (status = 400, description = "Payload is not a JSON object", body = ErrorResponse),
        (status = 502, description = "Broker rejected a bind or the publish", body = ErrorResponse),
        (status = 503, description = "Broker closed or registry unavailable", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let report = state.send_service.send(&req.0).await?;
    Ok((StatusCode::ACCEPTED, Json(SendMessageResponse::from(report))))
}

/// Message routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/messages", post(send_message))
}
