//! Periodic, overlapping replacement of stream receivers.
//!
//! Long-lived connections to a relay service go stale in ways that are not
//! always reported as errors. The supervisor bounds the lifetime of any one
//! connection by starting a fresh receiver on every interval tick and only
//! stopping the oldest one once the fresh one is connected. There is never a
//! moment with zero connected receivers during a handover; the price is that
//! an event arriving right at the boundary may be delivered by both.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use hookrelay_delivery::DispatchHandle;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    receiver::{ReceiverConfig, ReceiverState, StreamReceiver},
    source::EventSource,
};

/// Configuration for the reconnect supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// How often to replace the live receiver; `None` disables replacement.
    pub reconnect_interval: Option<Duration>,
    /// Configuration for each receiver.
    pub receiver: ReceiverConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Some(Duration::from_secs(crate::DEFAULT_RECONNECT_INTERVAL_SECS)),
            receiver: ReceiverConfig::default(),
        }
    }
}

/// Result of one replacement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handover {
    /// The new receiver connected and the oldest was asked to stop.
    Completed,
    /// The new receiver stopped before connecting; the old one was kept.
    Abandoned,
}

/// Owns the live receivers, oldest first.
pub struct ReconnectSupervisor {
    source: Arc<dyn EventSource>,
    dispatch: DispatchHandle,
    config: SupervisorConfig,
    receivers: VecDeque<StreamReceiver>,
    retiring: Vec<StreamReceiver>,
    next_id: usize,
}

impl ReconnectSupervisor {
    /// Creates a supervisor. No receiver runs until `start` or `run`.
    pub fn new(
        source: Arc<dyn EventSource>,
        dispatch: DispatchHandle,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            source,
            dispatch,
            config,
            receivers: VecDeque::new(),
            retiring: Vec::new(),
            next_id: 0,
        }
    }

    /// Starts the first receiver if none is running.
    pub fn start(&mut self) {
        if self.receivers.is_empty() {
            let receiver = self.spawn_receiver();
            self.receivers.push_back(receiver);
        }
    }

    /// Number of receivers currently owned, excluding retiring ones.
    pub fn receiver_count(&self) -> usize {
        self.receivers.len()
    }

    /// States of the owned receivers, oldest first.
    pub fn receiver_states(&self) -> Vec<ReceiverState> {
        self.receivers.iter().map(StreamReceiver::state).collect()
    }

    /// Replaces the oldest receiver with a fresh one.
    ///
    /// The fresh receiver is appended first; the oldest receiver is only
    /// asked to stop after the fresh one reports connected.
    pub async fn replace_oldest(&mut self) -> Handover {
        trace!("replacing receiver");
        let fresh = self.spawn_receiver();
        self.receivers.push_back(fresh);

        // The fresh receiver is owned before the await so that cancelling
        // this future still leaves it reachable by `shutdown`.
        let connected = match self.receivers.back() {
            Some(fresh) => fresh.wait_connected().await,
            None => false,
        };

        if !connected {
            if let Some(fresh) = self.receivers.pop_back() {
                warn!(receiver_id = fresh.id(), "replacement receiver stopped before connecting");
                fresh.stop();
                self.retiring.push(fresh);
            }
            return Handover::Abandoned;
        }

        if self.receivers.len() > 1 {
            if let Some(oldest) = self.receivers.pop_front() {
                debug!(receiver_id = oldest.id(), "stopping old receiver");
                oldest.stop();
                self.retiring.push(oldest);
            }
        }
        self.reap_retired();
        Handover::Completed
    }

    /// Runs the replacement loop until `shutdown` is cancelled, then stops
    /// every receiver and waits for them to exit.
    pub async fn run(mut self, shutdown: CancellationToken) {
        self.start();
        info!(
            url = %self.source.url(),
            interval_secs = self.config.reconnect_interval.map(|i| i.as_secs()),
            "reconnect supervisor started"
        );

        if let Some(interval) = self.config.reconnect_interval {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(interval) => {},
                }
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = self.replace_oldest() => {},
                }
            }
        } else {
            shutdown.cancelled().await;
        }

        self.shutdown().await;
    }

    /// Stops every receiver and waits for each to exit.
    pub async fn shutdown(mut self) {
        let receivers: Vec<StreamReceiver> =
            self.receivers.drain(..).chain(self.retiring.drain(..)).collect();
        debug!(count = receivers.len(), "stopping receivers");

        for receiver in &receivers {
            receiver.stop();
        }
        for receiver in receivers {
            receiver.join().await;
        }
        info!("all receivers stopped");
    }

    fn spawn_receiver(&mut self) -> StreamReceiver {
        let id = self.next_id;
        self.next_id += 1;
        StreamReceiver::spawn(
            id,
            self.source.clone(),
            self.dispatch.clone(),
            self.config.receiver.clone(),
        )
    }

    fn reap_retired(&mut self) {
        self.retiring.retain(|receiver| !receiver.is_finished());
    }
}
