//! Test infrastructure for hookrelay integration tests.
//!
//! Provides a recording message handler, a scripted event source for
//! driving receivers deterministically, envelope and SSE builders,
//! wiremock helpers for SSE sources and forward targets, and log capture.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
pub mod handlers;
pub mod http;
pub mod logs;
pub mod source;

use std::time::Duration;

pub use fixtures::{envelope, message_event, sse_body};
pub use handlers::{CapturingHandler, PanickingHandler};
pub use http::{mount_forward_target, mount_sse_source, post_requests};
pub use logs::{capture_logs, LogBuffer};
pub use source::{ScriptedSource, Step};

/// Default upper bound for waits in tests.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds or `timeout` elapses.
///
/// Returns whether the condition was met.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
