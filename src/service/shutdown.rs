//! Worker launch and ordered teardown.
//!
//! Teardown always runs in the same order: fire cancellation, wait for every
//! worker to release its join guard (bounded by the drain timeout), sweep
//! the registry, close all publisher sinks, and finally close the broker.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::worker::{ConsumerWorker, WorkerOutcome};
use crate::context::RelayContext;
use crate::domain::{JoinBarrier, QueueName};

/// What teardown observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Outcomes of the workers that finished.
    pub workers: Vec<WorkerOutcome>,
    /// `false` if the drain timeout elapsed and stragglers were aborted.
    pub drained: bool,
    /// `true` if the registry sweep succeeded.
    pub registry_swept: bool,
}

/// Owns the worker tasks and the join barrier they report to.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    ctx: RelayContext,
    barrier: JoinBarrier,
    workers: Vec<JoinHandle<WorkerOutcome>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator with no workers.
    #[must_use]
    pub fn new(ctx: RelayContext) -> Self {
        Self {
            ctx,
            barrier: JoinBarrier::new(),
            workers: Vec::new(),
        }
    }

    /// Barrier the workers hold guards on.
    #[must_use]
    pub fn barrier(&self) -> &JoinBarrier {
        &self.barrier
    }

    /// Spawns one worker and returns its readiness receiver.
    ///
    /// The guard is taken before the task is spawned, so the barrier never
    /// misses a worker that has not been scheduled yet.
    pub fn spawn_worker(&mut self) -> oneshot::Receiver<QueueName> {
        let (tx, rx) = oneshot::channel();
        let id = self.workers.len();
        let guard = self.barrier.enter();
        let worker = ConsumerWorker::new(id, self.ctx.clone()).with_ready(tx);
        self.workers.push(tokio::spawn(worker.run(guard)));
        rx
    }

    /// Spawns `count` workers one after another, waiting for each to start
    /// consuming before launching the next.
    ///
    /// Returns the queues of the workers that became ready; a worker that
    /// failed during startup is simply absent.
    pub async fn spawn_workers(&mut self, count: usize) -> Vec<QueueName> {
        let mut ready = Vec::with_capacity(count);
        for _ in 0..count {
            match self.spawn_worker().await {
                Ok(queue) => ready.push(queue),
                Err(_) => tracing::warn!("worker exited before it started consuming"),
            }
        }
        tracing::info!(requested = count, ready = ready.len(), "workers started");
        ready
    }

    /// Waits for cancellation, then tears down.
    pub async fn run_until_cancelled(self) -> ShutdownReport {
        self.ctx.cancel.cancelled().await;
        tracing::info!("shutdown requested");
        self.shutdown().await
    }

    /// Fires cancellation (if it has not fired yet) and tears down.
    pub async fn shutdown(self) -> ShutdownReport {
        self.ctx.cancel.cancel();

        let drain_timeout = self.ctx.config.snapshot().shutdown_drain_timeout;
        tracing::info!(workers = self.barrier.remaining(), "waiting for workers");
        let drained = tokio::time::timeout(drain_timeout, self.barrier.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.barrier.remaining(),
                ?drain_timeout,
                "drain timeout elapsed, aborting remaining workers"
            );
        }

        let mut outcomes = Vec::with_capacity(self.workers.len());
        for handle in self.workers {
            if !drained && !handle.is_finished() {
                handle.abort();
                continue;
            }
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!(error = %e, "worker task failed"),
            }
        }

        let registry_swept = match self.ctx.registry.truncate_all().await {
            Ok(()) => {
                tracing::info!("queue registry truncated");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to truncate queue registry");
                false
            }
        };

        if self.ctx.publisher.shutdown_all().await {
            tracing::info!("publisher sinks closed");
        }
        if self.ctx.broker.close().await {
            tracing::info!("broker closed");
        }

        ShutdownReport {
            workers: outcomes,
            drained,
            registry_swept,
        }
    }
}
