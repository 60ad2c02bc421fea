//! Outbound send path.
//!
//! Sending serializes the message, re-binds every registered queue to the
//! distribution point, then publishes once. Binding is fail-fast: the first
//! queue that cannot be bound aborts the send before anything is published.
//! There is no retry at this layer; callers decide whether to try again.

use serde::Serialize;

use crate::context::RelayContext;
use crate::domain::message;
use crate::error::RelayError;

/// What a successful send did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Number of registered queues bound before publishing.
    pub bound_queues: usize,
    /// Size of the published body in bytes.
    pub bytes: usize,
}

/// Broadcasts messages to every registered queue.
#[derive(Debug, Clone)]
pub struct SendService {
    ctx: RelayContext,
}

impl SendService {
    /// Creates a send path over `ctx`.
    #[must_use]
    pub fn new(ctx: RelayContext) -> Self {
        Self { ctx }
    }

    /// Sends `msg` to every queue currently in the registry.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Closed`] if the broker connection is down.
    /// - [`RelayError::Serialization`] if `msg` is not a JSON object.
    /// - [`RelayError::RegistryUnavailable`] if the registry cannot be listed.
    /// - [`RelayError::Bind`] for the first queue that fails to bind.
    /// - [`RelayError::Publish`] if the publish fails or times out.
    pub async fn send<T: Serialize + ?Sized>(&self, msg: &T) -> Result<SendReport, RelayError> {
        if self.ctx.broker.is_closed().await {
            tracing::error!("cannot send: broker connection is closed");
            return Err(RelayError::Closed);
        }

        let body = message::encode(msg)
            .inspect_err(|e| tracing::error!(error = %e, "failed to serialize message"))?;

        let queues = self
            .ctx
            .registry
            .list_active()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to list registered queues"))?;

        for queue in &queues {
            self.ctx.broker.bind_queue(queue).await.inspect_err(
                |e| tracing::error!(queue = %queue, error = %e, "failed to bind queue"),
            )?;
        }

        let timeout = self.ctx.config.snapshot().broker.publish_timeout;
        match tokio::time::timeout(timeout, self.ctx.broker.publish(&body)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to publish message");
                return Err(e);
            }
            Err(_) => {
                tracing::error!(?timeout, "publish timed out");
                return Err(RelayError::Publish(format!("timed out after {timeout:?}")));
            }
        }

        tracing::info!(
            exchange = self.ctx.broker.exchange(),
            bound_queues = queues.len(),
            bytes = body.len(),
            "message sent"
        );
        Ok(SendReport {
            bound_queues: queues.len(),
            bytes: body.len(),
        })
    }
}
