//! Stream reception for hookrelay.
//!
//! A [`StreamReceiver`] attaches to an [`EventSource`] and submits every
//! frame it reads to a dispatch pool. It reconnects on its own whenever the
//! session fails or ends. The [`ReconnectSupervisor`] periodically starts a
//! replacement receiver and retires the oldest one once the replacement is
//! connected, so at least one receiver stays attached across handovers.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hookrelay_delivery::{DispatchPool, PoolConfig, SaveHandle, ShowHandler};
//! use hookrelay_stream::{ReconnectSupervisor, SseConfig, SseSource, SupervisorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let url = "https://smee.io/example";
//! let handler = Arc::new(ShowHandler);
//! let mut pool = DispatchPool::new(PoolConfig::default(), url, handler, SaveHandle::default())?;
//! pool.spawn_workers();
//!
//! let source = Arc::new(SseSource::new(url, &SseConfig::default())?);
//! let supervisor = ReconnectSupervisor::new(source, pool.handle(), SupervisorConfig::default());
//!
//! let shutdown = CancellationToken::new();
//! let task = tokio::spawn(supervisor.run(shutdown.clone()));
//!
//! shutdown.cancel();
//! task.await?;
//! pool.stop_all().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod receiver;
pub mod source;
pub mod supervisor;

pub use error::{Result, StreamError};
pub use receiver::{ReceiverConfig, ReceiverState, StreamReceiver};
pub use source::{EventSource, EventStream, SseConfig, SseSource};
pub use supervisor::{Handover, ReconnectSupervisor, SupervisorConfig};

/// Default pause before a receiver reconnects, in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// Default interval between receiver replacements, in seconds.
pub const DEFAULT_RECONNECT_INTERVAL_SECS: u64 = 3600;
