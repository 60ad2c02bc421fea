//! Broker layer: the fan-out distribution point and its queues.
//!
//! [`Broker`] is the capability surface the relay needs from a message
//! broker. [`amqp::AmqpBroker`] speaks AMQP 0-9-1 to RabbitMQ over a single
//! connection and channel; [`memory::InMemoryBroker`] reproduces fan-out
//! exchange semantics in process.

pub mod amqp;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::QueueName;
use crate::error::RelayError;

pub use amqp::AmqpBroker;
pub use memory::InMemoryBroker;

/// Content type attached to every published body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Stream of raw frame bodies delivered to one queue.
///
/// Ends when the broker closes the consumer. Items are already
/// acknowledged.
pub type InboundStream = BoxStream<'static, Result<Vec<u8>, RelayError>>;

/// Operations on the shared broker connection.
///
/// All methods multiplex over one channel and may be called concurrently.
#[async_trait]
pub trait Broker: Send + Sync + fmt::Debug {
    /// Name of the distribution point queues are bound to.
    fn exchange(&self) -> &str;

    /// Declares `queue` as non-durable, not auto-deleted, and exclusive to
    /// this connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Declare`] if the broker refuses, or
    /// [`RelayError::Closed`] after [`Broker::close`].
    async fn declare_queue(&self, queue: &QueueName) -> Result<(), RelayError>;

    /// Binds `queue` to the distribution point with an empty routing key.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bind`] if the broker refuses (for example the
    /// queue does not exist), or [`RelayError::Closed`].
    async fn bind_queue(&self, queue: &QueueName) -> Result<(), RelayError>;

    /// Publishes `body` to the distribution point as `application/json`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Publish`] on broker failure, or
    /// [`RelayError::Closed`].
    async fn publish(&self, body: &[u8]) -> Result<(), RelayError>;

    /// Starts an auto-acknowledged consumer on `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Consume`] if the consumer cannot be started,
    /// or [`RelayError::Closed`].
    async fn consume(&self, queue: &QueueName) -> Result<InboundStream, RelayError>;

    /// Closes the channel, then the connection.
    ///
    /// Returns `false` if the broker was already closed.
    async fn close(&self) -> bool;

    /// Returns `true` once the connection or channel is no longer usable.
    async fn is_closed(&self) -> bool;
}
