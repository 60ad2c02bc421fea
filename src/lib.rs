//! # fanout-relay
//!
//! Pub/sub fan-out relay over RabbitMQ with a PostgreSQL queue registry.
//!
//! A fixed pool of consumer workers each registers a uniquely named queue,
//! declares it on the broker, and forwards every JSON object it receives to
//! all in-process subscribers. Sending binds every registered queue to one
//! fan-out exchange and publishes once, so each worker sees each message.
//! On shutdown the workers drain, the registry is swept, subscriber sinks
//! close, and the broker connection is released, in that order.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── SendService, ConsumerWorker, ShutdownCoordinator (service/)
//!     ├── Publisher, JoinBarrier (domain/)
//!     │
//!     ├── Broker ── AmqpBroker (lapin) | InMemoryBroker
//!     └── QueueRegistry ── PostgresQueueRegistry (sqlx) | InMemoryQueueRegistry
//! ```

pub mod api;
pub mod app_state;
pub mod broker;
pub mod cancel;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod registry;
pub mod retry;
pub mod service;
pub mod telemetry;
pub mod ws;
