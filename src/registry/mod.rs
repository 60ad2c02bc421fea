//! Queue registry: the durable list of live queue names.
//!
//! The [`QueueRegistry`] trait is the four-operation surface the relay
//! needs. [`postgres::PostgresQueueRegistry`] backs it with stored
//! functions in PostgreSQL; [`memory::InMemoryQueueRegistry`] keeps the
//! rows in process.

pub mod memory;
pub mod postgres;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;

use crate::domain::QueueName;
use crate::error::RelayError;

pub use memory::InMemoryQueueRegistry;
pub use postgres::PostgresQueueRegistry;

/// Durable store of currently-registered queue names.
///
/// Implementations must be safe for concurrent callers.
#[async_trait]
pub trait QueueRegistry: Send + Sync + fmt::Debug {
    /// Atomically creates, stores, and returns a fresh unique name.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RegistryUnavailable`] if the store cannot be
    /// reached. No row is assumed to exist after an error.
    async fn generate_and_register(&self) -> Result<QueueName, RelayError>;

    /// Returns a snapshot of the registered names.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RegistryUnavailable`] on store failure.
    async fn list_active(&self) -> Result<BTreeSet<QueueName>, RelayError>;

    /// Removes `name`. Removing an absent name succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RegistryUnavailable`] on store failure.
    async fn delete(&self, name: &QueueName) -> Result<(), RelayError>;

    /// Removes every row.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RegistryUnavailable`] on store failure.
    async fn truncate_all(&self) -> Result<(), RelayError>;
}
