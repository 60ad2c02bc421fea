//! Consumer worker: one registered queue, one receive loop.
//!
//! A worker walks a fixed lifecycle:
//!
//! ```text
//! Registering ─► Declaring ─► Consuming ─► Draining ─► Deregistering ─► Done
//!      │              │
//!      └──────────────┼────────────────────────────────────────────────► Done
//!                     └─────────────────────────────────► Deregistering
//! ```
//!
//! A registry failure while registering ends the worker immediately; a
//! broker failure while declaring still removes the registry row. Whatever
//! path is taken, the [`JoinGuard`] the worker was started with is released
//! exactly once when [`ConsumerWorker::run`] returns.

use futures_util::StreamExt;
use tokio::sync::oneshot;

use crate::broker::InboundStream;
use crate::context::RelayContext;
use crate::domain::{JoinGuard, QueueName, message};

/// Lifecycle states of a [`ConsumerWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Asking the registry for a fresh queue name.
    Registering,
    /// Declaring the queue and opening its consumer.
    Declaring,
    /// Forwarding inbound frames to the publisher.
    Consuming,
    /// Releasing the consumer stream.
    Draining,
    /// Removing the queue's registry row.
    Deregistering,
    /// Terminal.
    Done,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerExit {
    /// Cancellation fired while consuming.
    Cancelled,
    /// The broker ended the inbound stream.
    StreamClosed,
    /// The inbound stream yielded a delivery error.
    StreamFailed,
    /// The registry could not produce a queue name.
    RegistrationFailed,
    /// The broker refused to declare the queue or open a consumer.
    DeclareFailed,
}

/// Summary returned when a worker finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    /// Worker index assigned at spawn time.
    pub worker_id: usize,
    /// Queue the worker owned, if registration succeeded.
    pub queue: Option<QueueName>,
    /// Messages handed to the publisher.
    pub delivered: u64,
    /// Frames discarded because they did not decode.
    pub dropped: u64,
    /// Exit reason.
    pub exit: WorkerExit,
}

/// Receive loop bound to one dynamically named queue.
#[derive(Debug)]
pub struct ConsumerWorker {
    id: usize,
    ctx: RelayContext,
    ready: Option<oneshot::Sender<QueueName>>,
}

impl ConsumerWorker {
    /// Creates a worker with index `id`.
    #[must_use]
    pub fn new(id: usize, ctx: RelayContext) -> Self {
        Self {
            id,
            ctx,
            ready: None,
        }
    }

    /// Reports the queue name on `ready` once the worker starts consuming.
    ///
    /// If the worker fails before that point the sender is dropped, so the
    /// receiving side observes a closed channel instead.
    #[must_use]
    pub fn with_ready(mut self, ready: oneshot::Sender<QueueName>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Runs the lifecycle to completion, releasing `guard` on return.
    pub async fn run(mut self, guard: JoinGuard) -> WorkerOutcome {
        let mut state = WorkerState::Registering;
        let mut queue: Option<QueueName> = None;
        let mut inbound: Option<InboundStream> = None;
        let mut exit = WorkerExit::Cancelled;
        let mut delivered = 0_u64;
        let mut dropped = 0_u64;

        loop {
            tracing::debug!(worker = self.id, ?state, "worker state");
            state = match state {
                WorkerState::Registering => match self.ctx.registry.generate_and_register().await
                {
                    Ok(name) => {
                        tracing::info!(worker = self.id, queue = %name, "queue registered");
                        queue = Some(name);
                        WorkerState::Declaring
                    }
                    Err(e) => {
                        tracing::error!(worker = self.id, error = %e, "failed to register queue");
                        exit = WorkerExit::RegistrationFailed;
                        WorkerState::Done
                    }
                },
                WorkerState::Declaring => match queue.as_ref() {
                    Some(name) => match self.open(name).await {
                        Some(stream) => {
                            inbound = Some(stream);
                            WorkerState::Consuming
                        }
                        None => {
                            exit = WorkerExit::DeclareFailed;
                            WorkerState::Deregistering
                        }
                    },
                    None => WorkerState::Done,
                },
                WorkerState::Consuming => {
                    if let (Some(name), Some(stream)) = (queue.as_ref(), inbound.as_mut()) {
                        if let Some(ready) = self.ready.take() {
                            let _ = ready.send(name.clone());
                        }
                        exit = self
                            .receive(name, stream, &mut delivered, &mut dropped)
                            .await;
                    }
                    WorkerState::Draining
                }
                WorkerState::Draining => {
                    inbound = None;
                    WorkerState::Deregistering
                }
                WorkerState::Deregistering => {
                    if let Some(name) = queue.as_ref() {
                        match self.ctx.registry.delete(name).await {
                            Ok(()) => {
                                tracing::info!(worker = self.id, queue = %name, "queue deregistered");
                            }
                            Err(e) => tracing::error!(
                                worker = self.id,
                                queue = %name,
                                error = %e,
                                "failed to deregister queue"
                            ),
                        }
                    }
                    WorkerState::Done
                }
                WorkerState::Done => break,
            };
        }

        drop(inbound);
        drop(guard);
        WorkerOutcome {
            worker_id: self.id,
            queue,
            delivered,
            dropped,
            exit,
        }
    }

    /// Declares the queue and opens its consumer; failures are logged.
    async fn open(&self, name: &QueueName) -> Option<InboundStream> {
        if let Err(e) = self.ctx.broker.declare_queue(name).await {
            tracing::error!(worker = self.id, queue = %name, error = %e, "failed to declare queue");
            return None;
        }
        match self.ctx.broker.consume(name).await {
            Ok(stream) => {
                tracing::info!(worker = self.id, queue = %name, "consuming");
                Some(stream)
            }
            Err(e) => {
                tracing::error!(worker = self.id, queue = %name, error = %e, "failed to open consumer");
                None
            }
        }
    }

    async fn receive(
        &self,
        name: &QueueName,
        inbound: &mut InboundStream,
        delivered: &mut u64,
        dropped: &mut u64,
    ) -> WorkerExit {
        loop {
            tokio::select! {
                biased;
                () = self.ctx.cancel.cancelled() => {
                    tracing::info!(worker = self.id, queue = %name, "exiting receiver");
                    return WorkerExit::Cancelled;
                }
                frame = inbound.next() => match frame {
                    None => {
                        tracing::warn!(worker = self.id, queue = %name, "inbound stream closed by broker");
                        return WorkerExit::StreamClosed;
                    }
                    Some(Err(e)) => {
                        tracing::error!(worker = self.id, queue = %name, error = %e, "inbound stream failed");
                        return WorkerExit::StreamFailed;
                    }
                    Some(Ok(body)) => match message::decode(&body) {
                        Ok(msg) => {
                            let receivers = self.ctx.publisher.broadcast(msg).await;
                            tracing::debug!(worker = self.id, queue = %name, receivers, "message relayed");
                            *delivered += 1;
                        }
                        Err(e) => {
                            tracing::warn!(worker = self.id, queue = %name, error = %e, "dropping undecodable frame");
                            *dropped += 1;
                        }
                    },
                },
            }
        }
    }
}
