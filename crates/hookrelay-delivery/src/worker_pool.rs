//! Dispatch pool with supervised workers.
//!
//! A fixed number of workers pull from one FIFO queue. Stream receivers
//! submit events through cloneable [`DispatchHandle`]s; whichever worker is
//! idle takes the next event. Shutdown queues one stop marker per live
//! worker behind any real work, so `stop_all` is a drain rather than an
//! abort.

use std::{
    collections::BTreeSet,
    sync::{atomic::Ordering, Arc},
};

use hookrelay_core::RawEvent;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::{DeliveryError, Result},
    handler::MessageHandler,
    saver::SaveHandle,
    worker::{
        DispatchWorker, Job, JobReceiver, PoolStats, PoolStatsSnapshot, QueueDepth, WorkerRegistry,
    },
};

/// Configuration for the dispatch pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,
    /// Queue capacity; `None` means unbounded.
    pub queue_capacity: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { worker_count: crate::DEFAULT_WORKER_COUNT, queue_capacity: None }
    }
}

#[derive(Debug, Clone)]
enum SenderChannel {
    Bounded(mpsc::Sender<Job>),
    Unbounded(mpsc::UnboundedSender<Job>),
}

/// Producer side of the dispatch queue.
#[derive(Debug, Clone)]
struct JobSender {
    channel: SenderChannel,
    depth: QueueDepth,
}

impl JobSender {
    async fn send(&self, job: Job) -> Result<()> {
        // Counted before the send so a worker can never dequeue a job that
        // has not been counted yet.
        self.depth.fetch_add(1, Ordering::AcqRel);
        let sent = match &self.channel {
            SenderChannel::Bounded(sender) => sender.send(job).await.is_ok(),
            SenderChannel::Unbounded(sender) => sender.send(job).is_ok(),
        };
        if sent {
            Ok(())
        } else {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            Err(DeliveryError::PoolClosed)
        }
    }
}

/// Cloneable handle for submitting events to a [`DispatchPool`].
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    sender: JobSender,
}

impl DispatchHandle {
    /// Queues an event for the next idle worker.
    ///
    /// Returns immediately on an unbounded queue; waits for capacity on a
    /// bounded one.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::PoolClosed` if the pool has been dropped.
    pub async fn submit(&self, event: RawEvent) -> Result<()> {
        self.sender.send(Job::Event(event)).await
    }
}

/// Fixed-size pool of dispatch workers sharing one queue.
pub struct DispatchPool {
    config: PoolConfig,
    source: Arc<str>,
    sender: JobSender,
    queue: Arc<Mutex<JobReceiver>>,
    registry: WorkerRegistry,
    handler: Arc<dyn MessageHandler>,
    saver: SaveHandle,
    stats: Arc<PoolStats>,
    worker_handles: Vec<(usize, JoinHandle<()>)>,
}

impl DispatchPool {
    /// Creates a pool. Workers are not started until `spawn_workers`.
    ///
    /// `source` is only used for log context.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` for a zero worker count or a
    /// zero queue capacity.
    pub fn new(
        config: PoolConfig,
        source: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
        saver: SaveHandle,
    ) -> Result<Self> {
        if config.worker_count == 0 {
            return Err(DeliveryError::configuration("worker count must be greater than 0"));
        }

        let depth = QueueDepth::default();
        let (channel, receiver) = match config.queue_capacity {
            Some(0) => {
                return Err(DeliveryError::configuration("queue capacity must be greater than 0"))
            },
            Some(capacity) => {
                let (sender, receiver) = mpsc::channel(capacity);
                (SenderChannel::Bounded(sender), JobReceiver::bounded(receiver, depth.clone()))
            },
            None => {
                let (sender, receiver) = mpsc::unbounded_channel();
                (SenderChannel::Unbounded(sender), JobReceiver::unbounded(receiver, depth.clone()))
            },
        };
        let sender = JobSender { channel, depth };

        Ok(Self {
            config,
            source: Arc::from(source.into()),
            sender,
            queue: Arc::new(Mutex::new(receiver)),
            registry: Arc::new(std::sync::Mutex::new(BTreeSet::new())),
            handler,
            saver,
            stats: Arc::new(PoolStats::default()),
            worker_handles: Vec::new(),
        })
    }

    /// Spawns the configured number of workers.
    ///
    /// Calling this again adds another full set of workers.
    pub fn spawn_workers(&mut self) {
        let first_id = self.worker_handles.iter().map(|(id, _)| id + 1).max().unwrap_or(0);

        for worker_id in first_id..first_id + self.config.worker_count {
            self.lock_registry().insert(worker_id);

            let worker = DispatchWorker::new(
                worker_id,
                self.source.clone(),
                self.queue.clone(),
                self.registry.clone(),
                self.handler.clone(),
                self.saver.clone(),
                self.stats.clone(),
            );
            let handle = tokio::spawn(worker.run());
            self.worker_handles.push((worker_id, handle));
        }

        debug!(
            worker_count = self.config.worker_count,
            live_workers = self.live_worker_count(),
            persisting = self.saver.is_enabled(),
            "dispatch workers spawned"
        );
    }

    /// Returns a handle for submitting events.
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle { sender: self.sender.clone() }
    }

    /// Queues an event for the next idle worker.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::PoolClosed` if the queue is closed.
    pub async fn submit(&self, event: RawEvent) -> Result<()> {
        self.sender.send(Job::Event(event)).await
    }

    /// Ids of workers that have not yet stopped.
    pub fn live_workers(&self) -> Vec<usize> {
        self.lock_registry().iter().copied().collect()
    }

    /// Number of workers that have not yet stopped.
    pub fn live_worker_count(&self) -> usize {
        self.lock_registry().len()
    }

    /// Number of jobs submitted but not yet taken by a worker, stop markers
    /// included. A producer still waiting for bounded capacity is counted.
    pub fn queued(&self) -> usize {
        self.sender.depth.load(Ordering::Acquire)
    }

    /// Returns current pool counters.
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops every live worker after the work already queued, and waits.
    ///
    /// One stop marker is queued per live worker; each worker finishes the
    /// events ahead of it, consumes one marker, removes itself from the
    /// registry and exits. Returns once every worker task has been joined.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::WorkerPanic` if a worker task panicked outside
    /// per-event processing. All other workers are still joined.
    pub async fn stop_all(&mut self) -> Result<()> {
        let live = self.live_workers();
        info!(live_workers = live.len(), "stopping dispatch workers");

        for _ in &live {
            self.sender.send(Job::Stop).await?;
        }

        let mut first_failure = None;
        for (worker_id, handle) in std::mem::take(&mut self.worker_handles) {
            if !handle.is_finished() {
                debug!(worker_id, "waiting for worker to finish");
            }
            if let Err(join_error) = handle.await {
                error!(worker_id, error = %join_error, "worker task panicked");
                self.lock_registry().remove(&worker_id);
                first_failure.get_or_insert(DeliveryError::WorkerPanic {
                    worker_id,
                    error: join_error.to_string(),
                });
            }
        }

        let stats = self.stats();
        info!(
            events_processed = stats.events_processed,
            events_failed = stats.events_failed,
            "dispatch pool stopped"
        );

        first_failure.map_or(Ok(()), Err)
    }

    /// Check if any workers are still running.
    pub fn has_active_workers(&self) -> bool {
        self.worker_handles.iter().any(|(_, handle)| !handle.is_finished())
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, BTreeSet<usize>> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        let active_count =
            self.worker_handles.iter().filter(|(_, handle)| !handle.is_finished()).count();

        if active_count > 0 {
            warn!(
                active_workers = active_count,
                "DispatchPool dropped with active workers; they exit once every DispatchHandle \
                 is dropped. Call stop_all() to drain."
            );
        }
    }
}
