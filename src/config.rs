//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The loaded value is immutable; a
//! [`ConfigHandle`] holds the current snapshot and swaps in a whole new
//! value on reload.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};

use crate::error::RelayError;

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// RabbitMQ connection and distribution point settings.
    pub broker: BrokerConfig,

    /// PostgreSQL queue registry settings.
    pub registry: RegistryConfig,

    /// Exponential backoff parameters for [`crate::retry::RetryPolicy`].
    pub backoff: BackoffConfig,

    /// Number of consumer workers launched at startup.
    pub worker_count: usize,

    /// Capacity of each in-process subscriber sink.
    pub subscriber_capacity: usize,

    /// How long shutdown waits for workers to drain before sweeping anyway.
    pub shutdown_drain_timeout: Duration,

    /// Fallback log directive when `RUST_LOG` is unset.
    pub log_level: String,
}

/// Broker (AMQP) settings.
#[derive(Clone)]
pub struct BrokerConfig {
    /// Broker host name.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Virtual host name, not URL-encoded.
    pub vhost: String,
    /// Name of the fan-out exchange every queue binds to.
    pub exchange: String,
    /// Whether to declare the exchange on connect.
    pub declare_exchange: bool,
    /// Upper bound on a single publish.
    pub publish_timeout: Duration,
}

impl BrokerConfig {
    /// Builds the structured AMQP URI for this broker.
    ///
    /// Credentials and vhost are carried as fields, so reserved characters
    /// in them never need escaping.
    #[must_use]
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.user.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            ..AMQPUri::default()
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("vhost", &self.vhost)
            .field("exchange", &self.exchange)
            .field("declare_exchange", &self.declare_exchange)
            .field("publish_timeout", &self.publish_timeout)
            .finish()
    }
}

/// Queue registry (PostgreSQL) settings.
#[derive(Clone)]
pub struct RegistryConfig {
    /// Database host name.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub database: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Timeout for acquiring a connection.
    pub connect_timeout: Duration,
    /// Upper bound on a single registry call.
    pub operation_timeout: Duration,
    /// Apply the embedded migrations on startup.
    pub run_migrations: bool,
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// First delay between attempts.
    pub initial_interval: Duration,
    /// Growth factor applied to the delay after each attempt.
    pub multiplier: f64,
    /// Cap on a single delay.
    pub max_interval: Duration,
    /// Total time budget; [`Duration::ZERO`] means unbounded.
    pub max_elapsed_time: Duration,
    /// Jitter as a fraction of the current delay (0 disables jitter).
    pub randomization_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Duration::from_secs(60),
            randomization_factor: 0.5,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if `LISTEN_ADDR` is set but cannot be
    /// parsed, or if `WORKER_COUNT` is zero.
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_current_env()
    }

    /// Re-reads `.env` with override semantics and builds a fresh value.
    ///
    /// # Errors
    ///
    /// Same as [`RelayConfig::from_env`].
    pub fn reload() -> Result<Self, RelayError> {
        dotenvy::dotenv_override().ok();
        Self::from_current_env()
    }

    fn from_current_env() -> Result<Self, RelayError> {
        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| RelayError::Config(format!("LISTEN_ADDR: {e}")))?;

        let broker = BrokerConfig {
            host: env_or("BROKER_HOST", "localhost"),
            port: parse_env("BROKER_PORT", 5672),
            user: env_or("BROKER_USER", "guest"),
            password: env_or("BROKER_PASSWORD", "guest"),
            vhost: env_or("BROKER_VHOST", "/"),
            exchange: env_or("BROKER_EXCHANGE", "relay.fanout"),
            declare_exchange: parse_env_bool("BROKER_DECLARE_EXCHANGE", true),
            publish_timeout: Duration::from_secs(parse_env("BROKER_PUBLISH_TIMEOUT_SECS", 5)),
        };

        let registry = RegistryConfig {
            host: env_or("REGISTRY_HOST", "localhost"),
            port: parse_env("REGISTRY_PORT", 5432),
            user: env_or("REGISTRY_USER", "relay"),
            password: env_or("REGISTRY_PASSWORD", "relay"),
            database: env_or("REGISTRY_DATABASE", "relay"),
            max_connections: parse_env("REGISTRY_MAX_CONNECTIONS", 10),
            connect_timeout: Duration::from_secs(parse_env("REGISTRY_CONNECT_TIMEOUT_SECS", 10)),
            operation_timeout: Duration::from_secs(parse_env(
                "REGISTRY_OPERATION_TIMEOUT_SECS",
                30,
            )),
            run_migrations: parse_env_bool("REGISTRY_RUN_MIGRATIONS", true),
        };

        let defaults = BackoffConfig::default();
        let backoff = BackoffConfig {
            initial_interval: parse_env_millis(
                "BACKOFF_INITIAL_INTERVAL_MS",
                defaults.initial_interval,
            ),
            multiplier: parse_env("BACKOFF_MULTIPLIER", defaults.multiplier),
            max_interval: parse_env_millis("BACKOFF_MAX_INTERVAL_MS", defaults.max_interval),
            max_elapsed_time: parse_env_millis(
                "BACKOFF_MAX_ELAPSED_TIME_MS",
                defaults.max_elapsed_time,
            ),
            randomization_factor: parse_env(
                "BACKOFF_RANDOMIZATION_FACTOR",
                defaults.randomization_factor,
            ),
        };

        let worker_count = parse_env("WORKER_COUNT", 5);
        if worker_count == 0 {
            return Err(RelayError::Config(
                "WORKER_COUNT must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            listen_addr,
            broker,
            registry,
            backoff,
            worker_count,
            subscriber_capacity: parse_env("SUBSCRIBER_CAPACITY", 64_usize).max(1),
            shutdown_drain_timeout: Duration::from_secs(parse_env(
                "SHUTDOWN_DRAIN_TIMEOUT_SECS",
                30,
            )),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

/// Shared, swappable reference to the current [`RelayConfig`].
///
/// Readers take an `Arc` snapshot and never observe a half-written value;
/// [`ConfigHandle::replace`] installs a new snapshot wholesale.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<RelayConfig>>>,
}

impl ConfigHandle {
    /// Wraps an initial configuration.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RelayConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Installs `config` as the new snapshot.
    pub fn replace(&self, config: RelayConfig) {
        let fresh = Arc::new(config);
        match self.current.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use super::*;

    /// Configuration used by unit tests; never touches the environment.
    pub(crate) fn sample() -> RelayConfig {
        RelayConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            broker: BrokerConfig {
                host: "rabbit".to_string(),
                port: 5672,
                user: "guest".to_string(),
                password: "s3cret".to_string(),
                vhost: "/".to_string(),
                exchange: "relay.fanout".to_string(),
                declare_exchange: true,
                publish_timeout: Duration::from_secs(5),
            },
            registry: RegistryConfig {
                host: "pg".to_string(),
                port: 5432,
                user: "relay".to_string(),
                password: "s3cret".to_string(),
                database: "relay".to_string(),
                max_connections: 4,
                connect_timeout: Duration::from_secs(1),
                operation_timeout: Duration::from_secs(2),
                run_migrations: false,
            },
            backoff: BackoffConfig::default(),
            worker_count: 3,
            subscriber_capacity: 8,
            shutdown_drain_timeout: Duration::from_secs(5),
            log_level: "debug".to_string(),
        }
    }

    #[test]
    fn broker_uri_carries_every_field() {
        let uri = sample().broker.amqp_uri();
        assert_eq!(uri.authority.host, "rabbit");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.authority.userinfo.username, "guest");
        assert_eq!(uri.authority.userinfo.password, "s3cret");
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn broker_uri_keeps_reserved_characters_in_credentials() {
        let mut broker = sample().broker;
        broker.user = "ops:team".to_string();
        broker.password = "p@ss/word".to_string();
        broker.vhost = "tenant/a".to_string();

        let uri = broker.amqp_uri();
        assert_eq!(uri.authority.host, "rabbit");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.authority.userinfo.username, "ops:team");
        assert_eq!(uri.authority.userinfo.password, "p@ss/word");
        assert_eq!(uri.vhost, "tenant/a");
    }

    #[test]
    fn debug_output_redacts_passwords() {
        let cfg = sample();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn handle_replace_installs_new_snapshot() {
        let handle = ConfigHandle::new(sample());
        let before = handle.snapshot();

        let mut next = sample();
        next.broker.publish_timeout = Duration::from_secs(1);
        handle.replace(next);

        assert_eq!(before.broker.publish_timeout, Duration::from_secs(5));
        assert_eq!(
            handle.snapshot().broker.publish_timeout,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn missing_env_values_use_defaults() {
        assert_eq!(parse_env("FANOUT_RELAY_TEST_UNSET_KEY", 42_u32), 42);
        assert!(parse_env_bool("FANOUT_RELAY_TEST_UNSET_KEY", true));
        assert_eq!(
            parse_env_millis("FANOUT_RELAY_TEST_UNSET_KEY", Duration::from_millis(7)),
            Duration::from_millis(7)
        );
    }
}
