//! Message handlers for observing dispatch in tests.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use hookrelay_core::DecodedMessage;
use hookrelay_delivery::{MessageHandler, Result};
use tokio::sync::Notify;

/// Records every message it handles.
#[derive(Debug, Clone, Default)]
pub struct CapturingHandler {
    messages: Arc<Mutex<Vec<DecodedMessage>>>,
    notify: Arc<Notify>,
}

impl CapturingHandler {
    /// Creates an empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages handled so far, in completion order.
    pub fn messages(&self) -> Vec<DecodedMessage> {
        self.messages.lock().map(|messages| messages.clone()).unwrap_or_default()
    }

    /// Number of messages handled so far.
    pub fn count(&self) -> usize {
        self.messages.lock().map(|messages| messages.len()).unwrap_or_default()
    }

    /// Waits until at least `n` messages were handled or `timeout` elapses.
    ///
    /// Returns the messages seen at that point.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> Vec<DecodedMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.count() >= n {
                break;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                break;
            }
        }
        self.messages()
    }
}

#[async_trait]
impl MessageHandler for CapturingHandler {
    async fn handle(&self, message: DecodedMessage) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Panics on every message whose body contains `trigger`, records the rest.
#[derive(Debug, Clone)]
pub struct PanickingHandler {
    trigger: String,
    inner: CapturingHandler,
}

impl PanickingHandler {
    /// Creates a handler that panics on bodies containing `trigger`.
    pub fn new(trigger: impl Into<String>) -> Self {
        Self { trigger: trigger.into(), inner: CapturingHandler::new() }
    }

    /// The recorder for messages that did not trigger a panic.
    pub fn captured(&self) -> &CapturingHandler {
        &self.inner
    }
}

#[async_trait]
impl MessageHandler for PanickingHandler {
    async fn handle(&self, message: DecodedMessage) -> Result<()> {
        if message.body.contains(&self.trigger) {
            panic!("handler panic on {}", message.body);
        }
        self.inner.handle(message).await
    }
}
