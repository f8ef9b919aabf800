//! Long-lived stream receiver with automatic reconnection.
//!
//! A receiver owns one session against an [`EventSource`] at a time and
//! submits every frame to the dispatch pool in the order it arrives. When the
//! session fails or ends it logs the cause and connects again, for as long as
//! the process lives. Stopping is cooperative: the cancellation token is
//! raced against the pending read, so a stop takes effect without waiting
//! for the next frame.
//!
//! ```text
//!  Idle ──spawn──▶ Connecting ──frame──▶ Connected
//!                    ▲    │                 │
//!                    │    └─ error/end ◀────┘
//!                    │          │
//!                    └─ delay ◀─┘        stop() from any state ──▶ Stopped
//! ```

use std::{fmt, sync::Arc, time::Duration};

use futures::StreamExt;
use hookrelay_delivery::DispatchHandle;
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{error::Result, source::EventSource};

/// Observable state of a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverState {
    /// Opening a session, or between sessions.
    Connecting,
    /// At least one frame has arrived on the current session.
    Connected,
    /// The receiver has exited.
    Stopped,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Configuration for stream receivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Pause before reconnecting after a failed or ended session.
    pub reconnect_delay: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self { reconnect_delay: Duration::from_millis(crate::DEFAULT_RECONNECT_DELAY_MS) }
    }
}

/// How a single session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    Ended,
    DispatchClosed,
}

/// Handle to a running receiver task.
#[derive(Debug)]
pub struct StreamReceiver {
    id: usize,
    state: watch::Receiver<ReceiverState>,
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamReceiver {
    /// Spawns a receiver that starts connecting immediately.
    pub fn spawn(
        id: usize,
        source: Arc<dyn EventSource>,
        dispatch: DispatchHandle,
        config: ReceiverConfig,
    ) -> Self {
        let (state_tx, state) = watch::channel(ReceiverState::Connecting);
        let cancellation_token = CancellationToken::new();

        let task = ReceiverTask {
            id,
            source,
            dispatch,
            config,
            state: state_tx,
            cancellation_token: cancellation_token.clone(),
        };
        let task = tokio::spawn(task.run());

        Self { id, state, cancellation_token, task }
    }

    /// Receiver identifier, unique within a supervisor.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> ReceiverState {
        *self.state.borrow()
    }

    /// Whether the current session has delivered a frame.
    pub fn is_connected(&self) -> bool {
        self.state() == ReceiverState::Connected
    }

    /// Waits until the receiver is connected or has stopped.
    ///
    /// Returns `true` if it connected.
    pub async fn wait_connected(&self) -> bool {
        let mut state = self.state.clone();
        let connected = match state.wait_for(|s| *s != ReceiverState::Connecting).await {
            Ok(current) => *current == ReceiverState::Connected,
            Err(_) => false,
        };
        connected
    }

    /// Requests the receiver to stop. Idempotent.
    pub fn stop(&self) {
        if !self.cancellation_token.is_cancelled() {
            debug!(receiver_id = self.id, "stop requested");
            self.cancellation_token.cancel();
        }
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Whether the receiver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the receiver task to exit.
    pub async fn join(self) {
        if let Err(join_error) = self.task.await {
            error!(receiver_id = self.id, error = %join_error, "receiver task panicked");
        }
    }
}

/// State owned by the spawned receiver task.
struct ReceiverTask {
    id: usize,
    source: Arc<dyn EventSource>,
    dispatch: DispatchHandle,
    config: ReceiverConfig,
    state: watch::Sender<ReceiverState>,
    cancellation_token: CancellationToken,
}

impl ReceiverTask {
    /// Connect loop - reconnects until stopped or the pool goes away.
    async fn run(self) {
        let url = self.source.url().to_string();

        while !self.cancellation_token.is_cancelled() {
            self.state.send_replace(ReceiverState::Connecting);
            trace!(receiver_id = self.id, url = %url, "connecting to {url}");

            match self.run_session().await {
                Ok(SessionEnd::Stopped) => break,
                Ok(SessionEnd::DispatchClosed) => {
                    warn!(receiver_id = self.id, "dispatch pool closed, receiver exiting");
                    break;
                },
                Ok(SessionEnd::Ended) => {
                    info!(receiver_id = self.id, url = %url, "stream ended, reconnecting");
                },
                Err(error) => {
                    error!(
                        receiver_id = self.id,
                        url = %url,
                        error = %error,
                        "exception on receiver: {error}"
                    );
                },
            }

            self.state.send_replace(ReceiverState::Connecting);
            tokio::select! {
                biased;
                () = self.cancellation_token.cancelled() => break,
                () = tokio::time::sleep(self.config.reconnect_delay) => {},
            }
        }

        self.state.send_replace(ReceiverState::Stopped);
        debug!(receiver_id = self.id, "exiting");
    }

    /// Reads one session until it ends, fails, or a stop is requested.
    async fn run_session(&self) -> Result<SessionEnd> {
        let mut frames = tokio::select! {
            biased;
            () = self.cancellation_token.cancelled() => return Ok(SessionEnd::Stopped),
            session = self.source.connect() => session?,
        };

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancellation_token.cancelled() => return Ok(SessionEnd::Stopped),
                next = frames.next() => next,
            };

            let Some(frame) = next else {
                return Ok(SessionEnd::Ended);
            };
            let event = frame?;

            if self.cancellation_token.is_cancelled() {
                return Ok(SessionEnd::Stopped);
            }

            let state = if event.signals_close() {
                ReceiverState::Connecting
            } else {
                ReceiverState::Connected
            };
            self.state.send_if_modified(|current| {
                let changed = *current != state;
                *current = state;
                changed
            });
            trace!(receiver_id = self.id, "received msg: {}", event.dump().replace('\n', "\\n"));

            if self.dispatch.submit(event).await.is_err() {
                return Ok(SessionEnd::DispatchClosed);
            }
        }
    }
}
