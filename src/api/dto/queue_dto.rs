//! Queue registry DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::QueueName;

/// Response body for `GET /api/v1/queues`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueListResponse {
    /// Registered queue names, sorted.
    pub queues: Vec<QueueName>,
    /// Number of registered queues.
    pub count: usize,
}
