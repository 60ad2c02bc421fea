//! In-process fan-out of decoded inbound messages.
//!
//! [`Publisher`] keeps an append-only list of bounded subscriber sinks
//! behind a [`tokio::sync::RwLock`]. `subscribe` takes the write lock;
//! `broadcast` takes the read lock and awaits each sink in registration
//! order, so a full sink holds up delivery to everyone behind it.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use super::Message;

/// Receiving end of a subscriber sink.
///
/// Yields messages in arrival order and `None` once the publisher has shut
/// down.
pub type SubscriberHandle = mpsc::Receiver<Message>;

#[derive(Debug, Default)]
struct Sinks {
    senders: Vec<mpsc::Sender<Message>>,
    closed: bool,
}

/// Broadcast hub from consumer workers to in-process subscribers.
///
/// Cloning is cheap; all clones share the same subscriber list.
#[derive(Debug, Clone)]
pub struct Publisher {
    sinks: Arc<RwLock<Sinks>>,
    capacity: usize,
}

impl Publisher {
    /// Creates a publisher whose sinks buffer up to `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            sinks: Arc::new(RwLock::new(Sinks::default())),
            capacity: capacity.max(1),
        }
    }

    /// Registers a new sink and returns its receiving end.
    ///
    /// Sinks whose receivers were dropped are pruned here. After
    /// [`Publisher::shutdown_all`] the returned handle is already closed.
    pub async fn subscribe(&self) -> SubscriberHandle {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut sinks = self.sinks.write().await;
        if sinks.closed {
            return rx;
        }
        sinks.senders.retain(|sender| !sender.is_closed());
        sinks.senders.push(tx);
        tracing::debug!(subscribers = sinks.senders.len(), "subscriber registered");
        rx
    }

    /// Delivers `message` to every live sink in registration order.
    ///
    /// Waits for room in each sink before moving to the next one. Returns
    /// the number of sinks that accepted the message.
    pub async fn broadcast(&self, message: Message) -> usize {
        let sinks = self.sinks.read().await;
        let mut delivered = 0;
        for sender in &sinks.senders {
            if sender.send(message.clone()).await.is_ok() {
                delivered += 1;
            } else {
                tracing::debug!("skipping subscriber whose receiver was dropped");
            }
        }
        delivered
    }

    /// Closes every sink exactly once.
    ///
    /// Returns `false` if the publisher was already shut down.
    pub async fn shutdown_all(&self) -> bool {
        let mut sinks = self.sinks.write().await;
        if sinks.closed {
            tracing::debug!("publisher already shut down");
            return false;
        }
        let count = sinks.senders.len();
        sinks.senders.clear();
        sinks.closed = true;
        tracing::info!(subscribers = count, "closed all subscriber sinks");
        true
    }

    /// Returns the number of registered sinks, including ones whose
    /// receiver has been dropped but not yet pruned.
    pub async fn subscriber_count(&self) -> usize {
        self.sinks.read().await.senders.len()
    }

    /// Returns `true` once [`Publisher::shutdown_all`] has run.
    pub async fn is_shut_down(&self) -> bool {
        self.sinks.read().await.closed
    }
}
