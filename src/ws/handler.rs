//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let sink = state.ctx.publisher.subscribe().await;
    let cancel = state.ctx.cancel.clone();

    ws.on_upgrade(move |socket| run_connection(socket, sink, cancel))
}
