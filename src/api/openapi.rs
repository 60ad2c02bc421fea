//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{HealthResponse, QueueListResponse, SendMessageRequest, SendMessageResponse};
use crate::api::handlers::{messages, queues, system};
use crate::domain::QueueName;
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI specification, served under `/api-docs/openapi.json`
/// when the `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "fanout-relay",
        description = "Registry-coordinated RabbitMQ fan-out relay"
    ),
    paths(
        system::health_handler,
        queues::list_queues,
        messages::send_message,
    ),
    components(schemas(
        HealthResponse,
        QueueListResponse,
        QueueName,
        SendMessageRequest,
        SendMessageResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "System", description = "Liveness and shutdown state"),
        (name = "Queues", description = "Queue registry"),
        (name = "Messages", description = "Outbound broadcast"),
    )
)]
pub struct ApiDoc;
