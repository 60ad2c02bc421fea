//! In-process queue registry.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::QueueRegistry;
use crate::domain::QueueName;
use crate::error::RelayError;

/// Queue registry held in memory.
///
/// Names are `relay.q.<uuid>`; a collision with an existing row is retried.
/// [`InMemoryQueueRegistry::set_available`] simulates an unreachable store.
#[derive(Debug)]
pub struct InMemoryQueueRegistry {
    rows: RwLock<BTreeSet<QueueName>>,
    available: AtomicBool,
}

impl InMemoryQueueRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeSet::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Makes every subsequent operation fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the number of registered rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns `true` if no rows are registered.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::RegistryUnavailable(
                "in-memory registry marked unavailable".to_string(),
            ))
        }
    }
}

impl Default for InMemoryQueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueRegistry for InMemoryQueueRegistry {
    async fn generate_and_register(&self) -> Result<QueueName, RelayError> {
        self.check()?;
        let mut rows = self.rows.write().await;
        loop {
            let name = QueueName::new(format!("relay.q.{}", uuid::Uuid::new_v4().simple()));
            if rows.insert(name.clone()) {
                return Ok(name);
            }
        }
    }

    async fn list_active(&self) -> Result<BTreeSet<QueueName>, RelayError> {
        self.check()?;
        Ok(self.rows.read().await.clone())
    }

    async fn delete(&self, name: &QueueName) -> Result<(), RelayError> {
        self.check()?;
        self.rows.write().await.remove(name);
        Ok(())
    }

    async fn truncate_all(&self) -> Result<(), RelayError> {
        self.check()?;
        self.rows.write().await.clear();
        Ok(())
    }
}
