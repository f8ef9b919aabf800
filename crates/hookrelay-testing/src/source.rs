//! Scripted event source for deterministic receiver tests.
//!
//! Each call to `connect` consumes the next scripted session. A session is
//! either a refused connect or a list of steps played back as the frame
//! stream. Once the script runs out, further sessions stay open and silent.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use hookrelay_core::RawEvent;
use hookrelay_stream::{EventSource, EventStream, Result, StreamError};
use tokio::sync::Notify;

/// One step of a scripted session.
#[derive(Debug, Clone)]
pub enum Step {
    /// Yield a frame.
    Event(RawEvent),
    /// Yield a transport error.
    Fail(String),
    /// Block until the notify is triggered. Use `notify_one` so a trigger
    /// that happens before the step is reached is not lost.
    Wait(Arc<Notify>),
    /// Block forever; the session stays open until the receiver drops it.
    Hold,
}

#[derive(Debug)]
enum Session {
    Refuse(String),
    Stream(Vec<Step>),
}

/// An [`EventSource`] that plays back scripted sessions.
#[derive(Debug)]
pub struct ScriptedSource {
    url: String,
    sessions: Mutex<VecDeque<Session>>,
    connects: AtomicUsize,
    active: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// Creates a source with an empty script.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sessions: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Appends a session that plays `steps` and then ends.
    #[must_use]
    pub fn session(self, steps: Vec<Step>) -> Self {
        self.push(Session::Stream(steps));
        self
    }

    /// Appends a session whose connect fails.
    #[must_use]
    pub fn refuse(self, message: impl Into<String>) -> Self {
        self.push(Session::Refuse(message.into()));
        self
    }

    /// Number of connect attempts so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of sessions whose stream has not been dropped yet.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn push(&self, session: Session) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push_back(session);
        }
    }

    fn next_session(&self) -> Session {
        self.sessions
            .lock()
            .ok()
            .and_then(|mut sessions| sessions.pop_front())
            .unwrap_or_else(|| Session::Stream(vec![Step::Hold]))
    }
}

/// Decrements the active session count when the stream is dropped.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active.clone())
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<EventStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let steps = match self.next_session() {
            Session::Refuse(message) => return Err(StreamError::connect(&self.url, message)),
            Session::Stream(steps) => steps,
        };

        let state = (VecDeque::from(steps), ActiveGuard::new(&self.active));
        let frames = stream::unfold(state, |(mut steps, guard)| async move {
            loop {
                match steps.pop_front()? {
                    Step::Event(event) => return Some((Ok(event), (steps, guard))),
                    Step::Fail(message) => {
                        return Some((Err(StreamError::transport(message)), (steps, guard)));
                    },
                    Step::Wait(notify) => notify.notified().await,
                    Step::Hold => futures::future::pending::<()>().await,
                }
            }
        });

        Ok(frames.boxed())
    }
}
