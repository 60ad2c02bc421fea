//! PostgreSQL implementation of the queue registry.
//!
//! Every operation is a single call to a stored function installed by the
//! embedded migrations (`migrations/`). Name generation happens
//! server-side, so uniqueness is enforced by the table's primary key.
//! Each call is bounded by the configured operation timeout.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use super::QueueRegistry;
use crate::config::RegistryConfig;
use crate::domain::QueueName;
use crate::error::RelayError;

const GENERATE_AND_ADD_QUEUE: &str = "SELECT relay.generate_and_add_queue()";
const GET_ALL_QUEUES: &str = "SELECT relay.get_all_queues()";
const DELETE_QUEUE: &str = "SELECT relay.delete_queue($1)";
const TRUNCATE_QUEUES: &str = "SELECT relay.truncate_queues_table()";

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL-backed queue registry using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresQueueRegistry {
    pool: PgPool,
    operation_timeout: Duration,
}

impl PostgresQueueRegistry {
    /// Creates a registry over an existing connection pool with a 30s
    /// bound on each call.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Replaces the per-call bound.
    #[must_use]
    pub fn with_operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    /// Opens a connection pool and verifies it with a round trip.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connection`] if the database is unreachable or
    /// rejects the credentials.
    pub async fn connect(config: &RegistryConfig) -> Result<Self, RelayError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| RelayError::Connection(format!("registry: {e}")))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| RelayError::Connection(format!("registry ping: {e}")))?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connected to queue registry"
        );
        Ok(Self::new(pool).with_operation_timeout(config.operation_timeout))
    }

    /// Applies the embedded migrations that install the registry schema.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connection`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), RelayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::Connection(format!("registry migration: {e}")))?;
        tracing::info!("queue registry schema is up to date");
        Ok(())
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Runs one registry call, failing with
/// [`RelayError::RegistryUnavailable`] if it outlives `limit`.
async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, RelayError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::warn!(operation, ?limit, "registry call timed out");
            Err(RelayError::RegistryUnavailable(format!(
                "{operation} timed out after {limit:?}"
            )))
        }
    }
}

#[async_trait]
impl QueueRegistry for PostgresQueueRegistry {
    async fn generate_and_register(&self) -> Result<QueueName, RelayError> {
        let name = bounded(
            "generate_and_add_queue",
            self.operation_timeout,
            sqlx::query_scalar::<_, String>(GENERATE_AND_ADD_QUEUE).fetch_one(&self.pool),
        )
        .await?;
        Ok(QueueName::new(name))
    }

    async fn list_active(&self) -> Result<BTreeSet<QueueName>, RelayError> {
        let names = bounded(
            "get_all_queues",
            self.operation_timeout,
            sqlx::query_scalar::<_, Option<Vec<String>>>(GET_ALL_QUEUES).fetch_one(&self.pool),
        )
        .await?;
        Ok(names
            .unwrap_or_default()
            .into_iter()
            .map(QueueName::new)
            .collect())
    }

    async fn delete(&self, name: &QueueName) -> Result<(), RelayError> {
        bounded(
            "delete_queue",
            self.operation_timeout,
            sqlx::query(DELETE_QUEUE)
                .bind(name.as_str())
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn truncate_all(&self) -> Result<(), RelayError> {
        bounded(
            "truncate_queues_table",
            self.operation_timeout,
            sqlx::query(TRUNCATE_QUEUES).execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
