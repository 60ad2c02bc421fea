//! Service layer: orchestration over the registry, broker, and publisher.
//!
//! [`ConsumerWorker`] runs one queue's receive loop, [`SendService`]
//! broadcasts outbound messages to every registered queue, and
//! [`ShutdownCoordinator`] launches workers and tears everything down in
//! order once cancellation fires.

pub mod send;
pub mod shutdown;
pub mod worker;

pub use send::{SendReport, SendService};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use worker::{ConsumerWorker, WorkerExit, WorkerOutcome, WorkerState};
