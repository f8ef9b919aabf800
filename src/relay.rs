//! Lifecycle of the `show` and `forward` actions.
//!
//! Startup builds the pipeline back to front: persistence writer, message
//! handler, dispatch pool, then the reconnect supervisor and its first
//! receiver. Shutdown runs front to back so that no stage is drained while
//! the stage before it can still feed it:
//!
//! 1. stop every receiver (nothing new enters the queue)
//! 2. drain the dispatch pool (nothing new reaches the writer)
//! 3. drain the persistence writer
//!
//! Each step is bounded by the configured shutdown timeout.

use std::{future::Future, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use hookrelay_delivery::{
    DispatchPool, ForwardClient, ForwardHandler, MessageHandler, PoolStatsSnapshot, Saver,
    ShowHandler,
};
use hookrelay_stream::{EventSource, ReconnectSupervisor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::RelayConfig;

/// What a relay run should do.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Stream URL, for log context.
    pub source: String,
    /// Forward target; `None` displays messages instead.
    pub target: Option<String>,
    /// File raw messages are appended to.
    pub save: Option<PathBuf>,
    /// Tuning.
    pub config: RelayConfig,
}

/// How each shutdown step went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every receiver exited within the timeout.
    pub receivers_stopped: bool,
    /// Every dispatch worker drained and exited within the timeout.
    pub pool_drained: bool,
    /// Lines the writer wrote, if it drained within the timeout.
    pub lines_saved: Option<u64>,
    /// Dispatch counters at the end of the run.
    pub stats: PoolStatsSnapshot,
}

/// Runs the relay until `shutdown` resolves, then drains every stage.
///
/// # Errors
///
/// Returns error if the save file cannot be opened or the pool or client
/// cannot be built. Failures while draining are logged and reflected in the
/// report instead.
pub async fn run_relay(
    settings: RelaySettings,
    source: Arc<dyn EventSource>,
    shutdown: impl Future<Output = ()>,
) -> Result<ShutdownReport> {
    let RelaySettings { source: source_url, target, save, config } = settings;

    let saver = Saver::from_option(save.as_deref())
        .await
        .context("Failed to open save file")?;
    if let Some(path) = saver.path() {
        debug!(path = %path.display(), "Saving data to {}", path.display());
    }

    let handler: Arc<dyn MessageHandler> = match target {
        Some(target) => {
            let client = ForwardClient::new(config.client_config())
                .context("Failed to build forwarding client")?;
            let forward = ForwardHandler::new(client, target);
            info!(
                source = %source_url,
                forward_target = %forward.target(),
                "Forwarding {source_url} to {}",
                forward.target()
            );
            Arc::new(forward)
        },
        None => {
            info!(source = %source_url, "Showing messages from {source_url}");
            Arc::new(ShowHandler)
        },
    };

    let mut pool =
        DispatchPool::new(config.pool_config(), source_url.as_str(), handler, saver.handle())
            .context("Failed to create dispatch pool")?;
    pool.spawn_workers();
    trace!("Started {} workers", config.workers);

    let supervisor = ReconnectSupervisor::new(source, pool.handle(), config.supervisor_config());
    let receivers_token = CancellationToken::new();
    let mut supervisor_task = tokio::spawn(supervisor.run(receivers_token.clone()));

    tokio::select! {
        () = shutdown => {},
        result = &mut supervisor_task => {
            // Only reachable if the supervisor panicked.
            if let Err(join_error) = result {
                error!(error = %join_error, "reconnect supervisor failed");
            }
        },
    }
    debug!("Stopping");

    let timeout = config.shutdown_timeout();
    let mut report = ShutdownReport::default();

    receivers_token.cancel();
    if supervisor_task.is_finished() {
        report.receivers_stopped = true;
    } else {
        match tokio::time::timeout(timeout, supervisor_task).await {
            Ok(Ok(())) => report.receivers_stopped = true,
            Ok(Err(join_error)) => error!(error = %join_error, "reconnect supervisor failed"),
            Err(_) => warn!(timeout_secs = timeout.as_secs(), "receivers did not stop in time"),
        }
    }

    match tokio::time::timeout(timeout, pool.stop_all()).await {
        Ok(Ok(())) => report.pool_drained = true,
        Ok(Err(e)) => error!(error = %e, "dispatch pool did not stop cleanly"),
        Err(_) => warn!(timeout_secs = timeout.as_secs(), "dispatch pool did not drain in time"),
    }
    report.stats = pool.stats();

    match tokio::time::timeout(timeout, saver.stop_and_wait()).await {
        Ok(Ok(lines)) => report.lines_saved = Some(lines),
        Ok(Err(e)) => error!(error = %e, "persistence writer did not stop cleanly"),
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "persistence writer did not drain in time")
        },
    }

    info!(
        events_processed = report.stats.events_processed,
        events_failed = report.stats.events_failed,
        "relay stopped"
    );
    Ok(report)
}
