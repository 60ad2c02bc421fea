//! Process-wide cooperative cancellation.
//!
//! [`CancellationSignal`] is constructed once at startup and cloned into
//! every component that has to observe shutdown. It flips from "running"
//! to "cancelled" at most once; later triggers are no-ops.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One-shot cancellation flag backed by a [`watch`] channel.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationSignal {
    /// Creates a signal in the "running" state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the signal.
    ///
    /// Returns `true` only for the call that actually transitioned the
    /// signal; every later call returns `false`.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves when the signal fires (immediately if it already has).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Spawns a task that fires this signal on SIGINT or SIGTERM.
    ///
    /// Only the first signal starts shutdown; repeats are logged and
    /// otherwise ignored.
    #[must_use]
    pub fn listen_for_termination(&self) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            loop {
                let Some(name) = wait_for_termination().await else {
                    tracing::error!("unable to listen for termination signals");
                    return;
                };
                if signal.cancel() {
                    tracing::info!(signal = name, "received signal, initiating shutdown");
                } else {
                    tracing::info!(signal = name, "shutdown already in progress");
                }
            }
        })
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_termination() -> Option<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).ok()?;
    let mut terminate = signal(SignalKind::terminate()).ok()?;
    tokio::select! {
        _ = interrupt.recv() => Some("SIGINT"),
        _ = terminate.recv() => Some("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> Option<&'static str> {
    tokio::signal::ctrl_c().await.ok().map(|()| "ctrl-c")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn starts_running() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn cancel_transitions_exactly_once() {
        let signal = CancellationSignal::new();
        assert!(signal.cancel());
        assert!(!signal.cancel());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let signal = CancellationSignal::new();
        let observer = signal.clone();
        signal.cancel();
        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let signal = CancellationSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn cancelled_is_immediate_when_already_fired() {
        let signal = CancellationSignal::new();
        signal.cancel();
        let result = tokio::time::timeout(Duration::from_millis(100), signal.cancelled()).await;
        assert!(result.is_ok());
    }
}
