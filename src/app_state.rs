//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::context::RelayContext;
use crate::service::SendService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Process-wide resources.
    pub ctx: RelayContext,
    /// Outbound send path.
    pub send_service: Arc<SendService>,
}

impl AppState {
    /// Builds the state, wiring a [`SendService`] over `ctx`.
    #[must_use]
    pub fn new(ctx: RelayContext) -> Self {
        let send_service = Arc::new(SendService::new(ctx.clone()));
        Self { ctx, send_service }
    }
}
