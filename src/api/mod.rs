//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
    };

    router
}

/// Full HTTP application: REST routes, the `/ws` upgrade, and the
/// tracing and CORS layers.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::broker::Broker;
    use crate::context::tests::memory_context;
    use crate::registry::QueueRegistry;

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let Ok(resp) = app.oneshot(req).await else {
            panic!("router failed");
        };
        let status = resp.status();
        let Ok(bytes) = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await else {
            panic!("body read failed");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        let Ok(req) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("bad request");
        };
        req
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        let Ok(req) = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
        else {
            panic!("bad request");
        };
        req
    }

    #[tokio::test]
    async fn health_reports_broker_and_shutdown_state() {
        let (ctx, broker, _registry) = memory_context();
        let app = build_app(AppState::new(ctx.clone()));

        let (status, body) = call(app.clone(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["broker_connected"], true);

        ctx.cancel.cancel();
        let (status, body) = call(app.clone(), get_req("/health")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "shutting_down");

        assert!(broker.close().await);
        let (_, body) = call(app, get_req("/health")).await;
        assert_eq!(body["broker_connected"], false);
    }

    #[tokio::test]
    async fn list_queues_returns_registry_contents() {
        let (ctx, _broker, registry) = memory_context();
        let Ok(name) = registry.generate_and_register().await else {
            panic!("generate failed");
        };
        let app = build_app(AppState::new(ctx));

        let (status, body) = call(app, get_req("/api/v1/queues")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["queues"][0], name.as_str());
    }

    #[tokio::test]
    async fn list_queues_maps_registry_outage_to_503() {
        let (ctx, _broker, registry) = memory_context();
        registry.set_available(false);
        let app = build_app(AppState::new(ctx));

        let (status, body) = call(app, get_req("/api/v1/queues")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], 3001);
    }

    #[tokio::test]
    async fn send_message_is_accepted() {
        let (ctx, broker, _registry) = memory_context();
        let app = build_app(AppState::new(ctx));

        let (status, body) =
            call(app, post_json("/api/v1/messages", &json!({"Rabbit": "Kafka"}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["bound_queues"], 0);
        assert_eq!(broker.publish_calls(), 1);
    }

    #[tokio::test]
    async fn send_non_object_is_bad_request() {
        let (ctx, broker, _registry) = memory_context();
        let app = build_app(AppState::new(ctx));

        let (status, body) = call(app, post_json("/api/v1/messages", &json!("text"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1001);
        assert_eq!(broker.publish_calls(), 0);
    }

    #[tokio::test]
    async fn bind_failure_maps_to_bad_gateway() {
        let (ctx, _broker, registry) = memory_context();
        let Ok(_) = registry.generate_and_register().await else {
            panic!("generate failed");
        };
        let app = build_app(AppState::new(ctx));

        let (status, body) = call(app, post_json("/api/v1/messages", &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], 2003);
    }
}
