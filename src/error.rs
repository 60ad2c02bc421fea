//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Startup code
//! treats [`RelayError::Connection`] as fatal; every other variant is
//! contained to the single worker, send, or request that raised it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "registry unavailable: pool timed out while waiting for an open connection"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Relay error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status                 |
/// |-----------|------------------|-----------------------------|
/// | 1000–1999 | Payload          | 400 Bad Request             |
/// | 2000–2999 | Broker           | 502 Bad Gateway             |
/// | 3000–3999 | Registry / Infra | 503 / 500                   |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Broker or registry could not be reached or the handshake failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A registry operation failed after startup.
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// A message could not be encoded or decoded as a JSON object.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The broker refused to declare a queue.
    #[error("failed to declare queue {queue}: {reason}")]
    Declare {
        /// Queue that was being declared.
        queue: String,
        /// Broker-reported reason.
        reason: String,
    },

    /// The broker refused to start a consumer on a queue.
    #[error("failed to consume from queue {queue}: {reason}")]
    Consume {
        /// Queue that was being consumed.
        queue: String,
        /// Broker-reported reason.
        reason: String,
    },

    /// A queue could not be bound to the distribution point.
    #[error("failed to bind queue {queue}: {reason}")]
    Bind {
        /// Queue that was being bound.
        queue: String,
        /// Broker-reported reason.
        reason: String,
    },

    /// Publishing to the distribution point failed or timed out.
    #[error("publish failed: {0}")]
    Publish(String),

    /// The broker connection or channel has already been closed.
    #[error("broker connection is closed")]
    Closed,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Serialization(_) => 1001,
            Self::Declare { .. } => 2001,
            Self::Consume { .. } => 2002,
            Self::Bind { .. } => 2003,
            Self::Publish(_) => 2004,
            Self::Closed => 2005,
            Self::Connection(_) => 3000,
            Self::RegistryUnavailable(_) => 3001,
            Self::Config(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Serialization(_) => StatusCode::BAD_REQUEST,
            Self::Declare { .. } | Self::Consume { .. } | Self::Bind { .. } | Self::Publish(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Closed | Self::Connection(_) | Self::RegistryUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        Self::RegistryUnavailable(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
