//! Outbound message DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::service::SendReport;

/// Request body for `POST /api/v1/messages`: any JSON object.
///
/// Non-object bodies are accepted by the extractor and rejected by the send
/// path with a 400, so every payload error carries the same error envelope.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object, example = json!({"Rabbit": "Kafka"}))]
pub struct SendMessageRequest(pub serde_json::Value);

/// Response body for an accepted message.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SendMessageResponse {
    /// Number of registered queues bound before publishing.
    pub bound_queues: usize,
    /// Size of the published body in bytes.
    pub bytes: usize,
}

impl From<SendReport> for SendMessageResponse {
    fn from(report: SendReport) -> Self {
        Self {
            bound_queues: report.bound_queues,
            bytes: report.bytes,
        }
    }
}
