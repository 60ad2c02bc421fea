//! System endpoint DTOs.

use serde::Serialize;
use utoipa::ToSchema;

/// Health check response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"`, `"degraded"`, or `"shutting_down"`.
    pub status: String,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Whether the broker connection is usable.
    pub broker_connected: bool,
    /// Whether cancellation has fired.
    pub shutting_down: bool,
    /// Number of attached in-process subscribers.
    pub subscribers: usize,
}
