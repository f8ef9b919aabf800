//! Dispatch worker that processes events from the shared queue.
//!
//! Each worker loops on the pool's queue until it dequeues a stop marker.
//! Every event is processed in isolation: an error or even a panic while
//! handling one event is logged against that event and the worker moves on.

use std::{
    any::Any,
    collections::BTreeSet,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex as StdMutex,
    },
};

use futures::FutureExt;
use hookrelay_core::{decode, EventKind, RawEvent};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::{
    error::{DeliveryError, ErrorCategory, Result},
    handler::MessageHandler,
    saver::SaveHandle,
};

/// Item on the dispatch queue.
#[derive(Debug)]
pub(crate) enum Job {
    Event(RawEvent),
    Stop,
}

/// Jobs submitted but not yet taken by a worker.
///
/// Kept outside the receiver lock, which an idle worker holds while it waits.
pub(crate) type QueueDepth = Arc<AtomicUsize>;

#[derive(Debug)]
enum ReceiverChannel {
    Bounded(mpsc::Receiver<Job>),
    Unbounded(mpsc::UnboundedReceiver<Job>),
}

/// Consumer side of the dispatch queue, shared by all workers.
#[derive(Debug)]
pub(crate) struct JobReceiver {
    channel: ReceiverChannel,
    depth: QueueDepth,
}

impl JobReceiver {
    pub(crate) fn bounded(receiver: mpsc::Receiver<Job>, depth: QueueDepth) -> Self {
        Self { channel: ReceiverChannel::Bounded(receiver), depth }
    }

    pub(crate) fn unbounded(receiver: mpsc::UnboundedReceiver<Job>, depth: QueueDepth) -> Self {
        Self { channel: ReceiverChannel::Unbounded(receiver), depth }
    }

    pub(crate) async fn recv(&mut self) -> Option<Job> {
        let job = match &mut self.channel {
            ReceiverChannel::Bounded(receiver) => receiver.recv().await,
            ReceiverChannel::Unbounded(receiver) => receiver.recv().await,
        };
        if job.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        job
    }
}

/// Set of worker ids that have not yet consumed a stop marker.
pub(crate) type WorkerRegistry = Arc<StdMutex<BTreeSet<usize>>>;

/// Counters for pool monitoring.
#[derive(Debug, Default)]
pub struct PoolStats {
    processed: AtomicU64,
    failed: AtomicU64,
    messages: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// Events taken off the queue and processed, successfully or not.
    pub events_processed: u64,
    /// Events whose processing returned an error or panicked.
    pub events_failed: u64,
    /// `message` events handed to the message handler.
    pub messages_handled: u64,
}

impl PoolStats {
    /// Returns a snapshot of the counters.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            events_processed: self.processed.load(Ordering::Relaxed),
            events_failed: self.failed.load(Ordering::Relaxed),
            messages_handled: self.messages.load(Ordering::Relaxed),
        }
    }
}

/// One worker of the dispatch pool.
pub(crate) struct DispatchWorker {
    id: usize,
    source: Arc<str>,
    queue: Arc<Mutex<JobReceiver>>,
    registry: WorkerRegistry,
    handler: Arc<dyn MessageHandler>,
    saver: SaveHandle,
    stats: Arc<PoolStats>,
}

impl DispatchWorker {
    pub(crate) fn new(
        id: usize,
        source: Arc<str>,
        queue: Arc<Mutex<JobReceiver>>,
        registry: WorkerRegistry,
        handler: Arc<dyn MessageHandler>,
        saver: SaveHandle,
        stats: Arc<PoolStats>,
    ) -> Self {
        Self { id, source, queue, registry, handler, saver, stats }
    }

    /// Main worker loop - processes events until a stop marker arrives.
    pub(crate) async fn run(self) {
        trace!(worker_id = self.id, "dispatch worker starting");

        loop {
            let job = {
                let mut queue = self.queue.lock().await;
                queue.recv().await
            };

            let event = match job {
                Some(Job::Event(event)) => event,
                Some(Job::Stop) => {
                    trace!(worker_id = self.id, "dispatch worker stopping");
                    break;
                },
                None => {
                    debug!(worker_id = self.id, "dispatch queue closed");
                    break;
                },
            };

            let kind = event.kind.clone();
            let event_id = event.id.clone();
            let outcome = AssertUnwindSafe(self.process_event(event)).catch_unwind().await;
            self.stats.processed.fetch_add(1, Ordering::Relaxed);

            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(panic) => DeliveryError::HandlerPanic { message: panic_message(&*panic) },
            };
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                worker_id = self.id,
                kind = %kind,
                event_id = %event_id,
                category = %ErrorCategory::from(&error),
                error = %error,
                "exception processing {kind} event"
            );
        }

        self.deregister();
    }

    /// Processes one event according to its kind.
    ///
    /// # Errors
    ///
    /// Returns error if a `message` payload cannot be decoded or the handler
    /// fails to deliver it.
    async fn process_event(&self, event: RawEvent) -> Result<()> {
        match &event.kind {
            EventKind::Ping => {
                debug!(worker_id = self.id, event_id = %event.id, "ping {} received", event.id);
            },
            EventKind::Message => {
                if let Err(error) = self.saver.save(event.data.as_str()) {
                    warn!(
                        worker_id = self.id,
                        event_id = %event.id,
                        error = %error,
                        "failed to queue message for saving"
                    );
                }
                let message = decode(&event.data)?;
                self.stats.messages.fetch_add(1, Ordering::Relaxed);
                self.handler.handle(message).await?;
            },
            EventKind::Ready => {
                debug!(worker_id = self.id, source = %self.source, "connected to {}", self.source);
            },
            EventKind::Error => {
                info!(worker_id = self.id, event_id = %event.id, "error received: {event}");
            },
            EventKind::Other(kind) => {
                info!(worker_id = self.id, kind = %kind, "unknown event {kind} received: {event}");
            },
        }
        Ok(())
    }

    fn deregister(&self) {
        let mut registry = self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.remove(&self.id);
        trace!(worker_id = self.id, remaining = registry.len(), "dispatch worker stopped");
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_strings() {
        let static_payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*static_payload), "boom");

        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(&*owned_payload), "owned boom");

        let other_payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(&*other_payload), "non-string panic payload");
    }

    #[test]
    fn stats_snapshot_reflects_counters() {
        let stats = PoolStats::default();
        stats.processed.fetch_add(3, Ordering::Relaxed);
        stats.failed.fetch_add(1, Ordering::Relaxed);
        stats.messages.fetch_add(2, Ordering::Relaxed);

        assert_eq!(
            stats.snapshot(),
            PoolStatsSnapshot { events_processed: 3, events_failed: 1, messages_handled: 2 }
        );
    }
}
