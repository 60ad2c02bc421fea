//! In-process broker with fan-out exchange semantics.
//!
//! Queues are unbounded channels. Publishing copies the body into every
//! bound queue; binding a queue that was never declared fails the same way
//! RabbitMQ does. Counters and fault switches let tests observe and steer
//! the broker.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::{Mutex, mpsc};

use super::{Broker, InboundStream};
use crate::domain::QueueName;
use crate::error::RelayError;

#[derive(Debug)]
struct QueueSlot {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

#[derive(Debug, Default)]
struct State {
    queues: HashMap<QueueName, QueueSlot>,
    bindings: BTreeSet<QueueName>,
}

/// Broker living entirely in memory.
#[derive(Debug)]
pub struct InMemoryBroker {
    exchange: String,
    state: Mutex<State>,
    closed: AtomicBool,
    fail_publish: AtomicBool,
    bind_calls: AtomicUsize,
    publish_attempts: AtomicUsize,
    publish_calls: AtomicUsize,
}

impl InMemoryBroker {
    /// Creates a broker whose distribution point is named `exchange`.
    #[must_use]
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            state: Mutex::new(State::default()),
            closed: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
            bind_calls: AtomicUsize::new(0),
            publish_attempts: AtomicUsize::new(0),
            publish_calls: AtomicUsize::new(0),
        }
    }

    /// Number of bind attempts so far, successful or not.
    #[must_use]
    pub fn bind_calls(&self) -> usize {
        self.bind_calls.load(Ordering::SeqCst)
    }

    /// Number of publish attempts so far, successful or not.
    #[must_use]
    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    /// Number of successful publishes so far.
    #[must_use]
    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent publish fail (or succeed again).
    pub fn set_publish_failure(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Names of the declared queues.
    pub async fn declared_queues(&self) -> BTreeSet<QueueName> {
        self.state.lock().await.queues.keys().cloned().collect()
    }

    /// Names of the queues bound to the distribution point.
    pub async fn bound_queues(&self) -> BTreeSet<QueueName> {
        self.state.lock().await.bindings.clone()
    }

    /// Pushes a raw frame straight into `queue`, bypassing the exchange.
    ///
    /// Returns `false` if the queue does not exist.
    pub async fn inject(&self, queue: &QueueName, body: impl Into<Vec<u8>>) -> bool {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue)
            .is_some_and(|slot| slot.tx.send(body.into()).is_ok())
    }

    /// Deletes `queue` from the broker side, ending its consumer stream.
    pub async fn drop_queue(&self, queue: &QueueName) {
        let mut state = self.state.lock().await;
        state.queues.remove(queue);
        state.bindings.remove(queue);
    }

    fn check_open(&self) -> Result<(), RelayError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RelayError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    fn exchange(&self) -> &str {
        &self.exchange
    }

    async fn declare_queue(&self, queue: &QueueName) -> Result<(), RelayError> {
        self.check_open()?;
        let mut state = self.state.lock().await;
        state.queues.entry(queue.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            QueueSlot { tx, rx: Some(rx) }
        });
        Ok(())
    }

    async fn bind_queue(&self, queue: &QueueName) -> Result<(), RelayError> {
        self.check_open()?;
        self.bind_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if !state.queues.contains_key(queue) {
            return Err(RelayError::Bind {
                queue: queue.to_string(),
                reason: format!("NOT_FOUND - no queue '{queue}'"),
            });
        }
        state.bindings.insert(queue.clone());
        Ok(())
    }

    async fn publish(&self, body: &[u8]) -> Result<(), RelayError> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_open()?;
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(RelayError::Publish("injected publish failure".to_string()));
        }
        let state = self.state.lock().await;
        for name in &state.bindings {
            if let Some(slot) = state.queues.get(name) {
                let _ = slot.tx.send(body.to_vec());
            }
        }
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn consume(&self, queue: &QueueName) -> Result<InboundStream, RelayError> {
        self.check_open()?;
        let mut state = self.state.lock().await;
        let Some(slot) = state.queues.get_mut(queue) else {
            return Err(RelayError::Consume {
                queue: queue.to_string(),
                reason: format!("NOT_FOUND - no queue '{queue}'"),
            });
        };
        let Some(rx) = slot.rx.take() else {
            return Err(RelayError::Consume {
                queue: queue.to_string(),
                reason: "queue already has a consumer".to_string(),
            });
        };
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|body| (Ok(body), rx))
        })
        .boxed())
    }

    async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut state = self.state.lock().await;
        state.queues.clear();
        state.bindings.clear();
        true
    }

    async fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    async fn declared(broker: &InMemoryBroker, name: &str) -> QueueName {
        let queue = QueueName::from(name);
        let Ok(()) = broker.declare_queue(&queue).await else {
            panic!("declare failed");
        };
        queue
    }

    #[tokio::test]
    async fn publish_reaches_every_bound_queue() {
        let broker = InMemoryBroker::new("fanout");
        let a = declared(&broker, "a").await;
        let b = declared(&broker, "b").await;
        let _unbound = declared(&broker, "c").await;
        assert!(broker.bind_queue(&a).await.is_ok());
        assert!(broker.bind_queue(&b).await.is_ok());

        let Ok(mut stream_a) = broker.consume(&a).await else {
            panic!("consume a failed");
        };
        let Ok(mut stream_b) = broker.consume(&b).await else {
            panic!("consume b failed");
        };

        assert!(broker.publish(b"{\"k\":1}").await.is_ok());
        assert!(matches!(stream_a.next().await, Some(Ok(body)) if body == b"{\"k\":1}"));
        assert!(matches!(stream_b.next().await, Some(Ok(body)) if body == b"{\"k\":1}"));
        assert_eq!(broker.publish_calls(), 1);
    }

    #[tokio::test]
    async fn binding_undeclared_queue_fails() {
        let broker = InMemoryBroker::new("fanout");
        let err = broker.bind_queue(&QueueName::from("ghost")).await;
        assert!(matches!(err, Err(RelayError::Bind { .. })));
        assert_eq!(broker.bind_calls(), 1);
    }

    #[tokio::test]
    async fn second_consumer_is_rejected() {
        let broker = InMemoryBroker::new("fanout");
        let q = declared(&broker, "q").await;
        assert!(broker.consume(&q).await.is_ok());
        assert!(matches!(
            broker.consume(&q).await,
            Err(RelayError::Consume { .. })
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_streams() {
        let broker = InMemoryBroker::new("fanout");
        let q = declared(&broker, "q").await;
        let Ok(mut inbound) = broker.consume(&q).await else {
            panic!("consume failed");
        };

        assert!(broker.close().await);
        assert!(!broker.close().await);
        assert!(broker.is_closed().await);
        assert!(inbound.next().await.is_none());
        assert!(matches!(broker.publish(b"{}").await, Err(RelayError::Closed)));
    }

    #[tokio::test]
    async fn publish_failure_switch() {
        let broker = InMemoryBroker::new("fanout");
        broker.set_publish_failure(true);
        assert!(matches!(
            broker.publish(b"{}").await,
            Err(RelayError::Publish(_))
        ));
        assert_eq!(broker.publish_attempts(), 1);
        assert_eq!(broker.publish_calls(), 0);

        broker.set_publish_failure(false);
        assert!(broker.publish(b"{}").await.is_ok());
        assert_eq!(broker.publish_attempts(), 2);
        assert_eq!(broker.publish_calls(), 1);
    }
}
