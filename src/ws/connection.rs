//! WebSocket connection loop.
//!
//! Forwards relayed messages from a publisher sink to the client and
//! answers client commands. The loop ends when the client closes, the
//! publisher closes the sink, or the relay is cancelled.

use axum::extract::ws::{Message as WsFrame, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::messages::{WsCommand, WsMessage, WsMessageType};
use crate::cancel::CancellationSignal;
use crate::domain::SubscriberHandle;

/// Runs the read/write loop for a single WebSocket connection.
pub async fn run_connection(
    socket: WebSocket,
    mut sink: SubscriberHandle,
    cancel: CancellationSignal,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(WsFrame::Close(None)).await;
                break;
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(WsFrame::Text(text))) => {
                        if let Some(reply) = handle_text_message(&text)
                            && ws_tx.send(WsFrame::text(reply)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(WsFrame::Close(_))) | None => break,
                    _ => {}
                }
            }
            relayed = sink.recv() => {
                let Some(message) = relayed else {
                    tracing::debug!("publisher closed ws sink");
                    break;
                };
                match serde_json::to_string(&WsMessage::event(message)) {
                    Ok(json) => {
                        if ws_tx.send(WsFrame::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to encode ws event"),
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Handles a text frame from the client, returning an optional JSON reply.
fn handle_text_message(text: &str) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error(String::new(), 400, "malformed JSON")).ok();
    };
    if msg.msg_type != WsMessageType::Command {
        return serde_json::to_string(&WsMessage::error(msg.id, 400, "expected a command")).ok();
    }

    let reply = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(WsCommand::Ping) => WsMessage::response(msg.id, serde_json::json!({ "pong": true })),
        Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
    };
    serde_json::to_string(&reply).ok()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn reply(input: &str) -> Value {
        let Some(text) = handle_text_message(input) else {
            panic!("no reply");
        };
        let Ok(value) = serde_json::from_str(&text) else {
            panic!("reply is not JSON");
        };
        value
    }

    #[test]
    fn malformed_json_gets_error() {
        let value = reply("{nope");
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["code"], 400);
    }

    #[test]
    fn ping_gets_pong() {
        let value = reply(
            &json!({
                "id": "req-1",
                "type": "command",
                "timestamp": "2025-01-01T00:00:00Z",
                "payload": {"command": "ping"}
            })
            .to_string(),
        );
        assert_eq!(value["type"], "response");
        assert_eq!(value["id"], "req-1");
        assert_eq!(value["payload"]["pong"], true);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let value = reply(
            &json!({
                "id": "req-2",
                "type": "command",
                "timestamp": "2025-01-01T00:00:00Z",
                "payload": {"command": "swap"}
            })
            .to_string(),
        );
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["code"], 404);
    }
}
