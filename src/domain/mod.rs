//! Domain layer: messages, queue names, fan-out, and worker accounting.
//!
//! These types have no knowledge of the broker or the registry backend;
//! the service layer wires them to both.

pub mod join_barrier;
pub mod message;
pub mod publisher;
pub mod queue_name;

pub use join_barrier::{JoinBarrier, JoinGuard};
pub use message::Message;
pub use publisher::{Publisher, SubscriberHandle};
pub use queue_name::QueueName;
