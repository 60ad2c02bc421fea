//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fanout_relay::broker::{Broker, InMemoryBroker};
use fanout_relay::cancel::CancellationSignal;
use fanout_relay::config::{BackoffConfig, BrokerConfig, ConfigHandle, RegistryConfig, RelayConfig};
use fanout_relay::context::RelayContext;
use fanout_relay::registry::{InMemoryQueueRegistry, QueueRegistry};

/// Configuration pointing at nothing real; only the in-memory backends read it.
pub fn config() -> RelayConfig {
    RelayConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        broker: BrokerConfig {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            exchange: "relay.fanout".to_string(),
            declare_exchange: true,
            publish_timeout: Duration::from_secs(5),
        },
        registry: RegistryConfig {
            host: "localhost".to_string(),
            port: 5432,
            user: "relay".to_string(),
            password: "relay".to_string(),
            database: "relay".to_string(),
            max_connections: 2,
            connect_timeout: Duration::from_secs(1),
            operation_timeout: Duration::from_secs(2),
            run_migrations: false,
        },
        backoff: BackoffConfig::default(),
        worker_count: 3,
        subscriber_capacity: 16,
        shutdown_drain_timeout: Duration::from_secs(5),
        log_level: "info".to_string(),
    }
}

/// A relay context over in-memory backends, with typed handles kept for
/// assertions.
#[derive(Debug)]
pub struct Harness {
    pub ctx: RelayContext,
    pub broker: Arc<InMemoryBroker>,
    pub registry: Arc<InMemoryQueueRegistry>,
}

pub fn harness() -> Harness {
    let broker = Arc::new(InMemoryBroker::new("relay.fanout"));
    let registry = Arc::new(InMemoryQueueRegistry::new());
    let ctx = RelayContext::new(
        ConfigHandle::new(config()),
        CancellationSignal::new(),
        Arc::clone(&registry) as Arc<dyn QueueRegistry>,
        Arc::clone(&broker) as Arc<dyn Broker>,
    );
    Harness {
        ctx,
        broker,
        registry,
    }
}

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);
