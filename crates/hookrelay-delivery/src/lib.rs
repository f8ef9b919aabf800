//! Event dispatch, forwarding and persistence.
//!
//! This crate implements everything that happens to an event after a stream
//! receiver has read it:
//!
//! 1. **Dispatch** - a fixed pool of workers pulls events from one shared
//!    FIFO queue ([`DispatchPool`])
//! 2. **Persist** - raw `message` payloads are appended to a file by a
//!    single writer task ([`Saver`])
//! 3. **Decode** - the envelope is turned into headers and a canonical body
//! 4. **Deliver** - the decoded message is forwarded over HTTP or logged
//!    ([`MessageHandler`])
//!
//! Failures are contained per event: a malformed payload or an unreachable
//! forward target is logged and the worker continues with the next event.
//! Nothing is retried.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hookrelay_core::RawEvent;
//! use hookrelay_delivery::{DispatchPool, PoolConfig, Saver, ShowHandler};
//!
//! # async fn example() -> hookrelay_delivery::Result<()> {
//! let saver = Saver::open("saved.txt").await?;
//! let mut pool = DispatchPool::new(
//!     PoolConfig::default(),
//!     "https://smee.io/example",
//!     Arc::new(ShowHandler),
//!     saver.handle(),
//! )?;
//! pool.spawn_workers();
//!
//! pool.submit(RawEvent::message("1", r#"{"body":{"a":1}}"#)).await?;
//!
//! pool.stop_all().await?;
//! saver.stop_and_wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod handler;
pub mod replay;
pub mod saver;
mod worker;
pub mod worker_pool;

pub use client::{ClientConfig, ForwardClient, ForwardResponse};
pub use error::{DeliveryError, ErrorCategory, Result};
pub use handler::{ForwardHandler, MessageHandler, ShowHandler};
pub use replay::{replay_file, ReplaySummary};
pub use saver::{SaveHandle, Saver};
pub use worker::{PoolStats, PoolStatsSnapshot};
pub use worker_pool::{DispatchHandle, DispatchPool, PoolConfig};

/// Default number of concurrent dispatch workers.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Default forward request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
