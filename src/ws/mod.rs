//! WebSocket layer: streams relayed messages to connected clients.
//!
//! Each connection at `/ws` attaches one publisher sink and forwards every
//! relayed message as an `event` envelope until the client leaves, the
//! publisher shuts down, or the relay is cancelled.

pub mod connection;
pub mod handler;
pub mod messages;
