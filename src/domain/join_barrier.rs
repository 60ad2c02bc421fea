//! Count of still-running consumer workers.
//!
//! Each worker holds a [`JoinGuard`] for its whole lifetime. Dropping the
//! guard (normal return or panic unwind) decrements the count, and
//! [`JoinBarrier::wait`] resolves once it reaches zero.

use std::sync::Arc;

use tokio::sync::watch;

/// Join counter observed by the shutdown coordinator.
#[derive(Debug, Clone)]
pub struct JoinBarrier {
    remaining: Arc<watch::Sender<usize>>,
}

/// Slot held by one running worker.
#[derive(Debug)]
#[must_use = "dropping the guard immediately releases the worker's slot"]
pub struct JoinGuard {
    remaining: Arc<watch::Sender<usize>>,
}

impl JoinBarrier {
    /// Creates a barrier with no registered workers.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            remaining: Arc::new(tx),
        }
    }

    /// Registers one running worker.
    pub fn enter(&self) -> JoinGuard {
        self.remaining.send_modify(|n| *n = n.saturating_add(1));
        JoinGuard {
            remaining: Arc::clone(&self.remaining),
        }
    }

    /// Number of workers that have not reached `Done`.
    #[must_use]
    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    /// Resolves once every registered worker has released its guard.
    pub async fn wait(&self) {
        let mut rx = self.remaining.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for JoinBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        self.remaining.send_modify(|n| *n = n.saturating_sub(1));
    }
}
