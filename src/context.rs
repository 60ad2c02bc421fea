//! Explicit service context shared by every component.
//!
//! Built once at startup and cloned into workers, the send path, the
//! shutdown coordinator, and the HTTP layer.

use std::sync::Arc;

use crate::broker::Broker;
use crate::cancel::CancellationSignal;
use crate::config::ConfigHandle;
use crate::domain::Publisher;
use crate::registry::QueueRegistry;

/// Handles to the process-wide resources.
#[derive(Debug, Clone)]
pub struct RelayContext {
    /// Current configuration snapshot holder.
    pub config: ConfigHandle,
    /// Process cancellation signal.
    pub cancel: CancellationSignal,
    /// Queue registry backend.
    pub registry: Arc<dyn QueueRegistry>,
    /// Shared broker connection.
    pub broker: Arc<dyn Broker>,
    /// In-process fan-out hub.
    pub publisher: Publisher,
}

impl RelayContext {
    /// Assembles a context; the publisher is sized from `config`.
    #[must_use]
    pub fn new(
        config: ConfigHandle,
        cancel: CancellationSignal,
        registry: Arc<dyn QueueRegistry>,
        broker: Arc<dyn Broker>,
    ) -> Self {
        let publisher = Publisher::new(config.snapshot().subscriber_capacity);
        Self {
            config,
            cancel,
            registry,
            broker,
            publisher,
        }
    }
}
