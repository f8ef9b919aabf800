//! Replay of saved messages.
//!
//! Reads a file written by the persistence writer and POSTs each non-blank
//! line to a target, one at a time and in file order.

use std::path::Path;

use hookrelay_core::decode;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tracing::{error, info, trace};

use crate::{client::ForwardClient, error::Result};

/// Outcome of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Lines that reached the target, whatever the status code.
    pub sent: usize,
    /// Lines that failed to decode or to send.
    pub failed: usize,
    /// Blank lines skipped.
    pub skipped: usize,
}

/// Sends every non-blank line of `path` to `target`.
///
/// Lines are trimmed before use. A line that fails to decode or send is
/// logged and counted; the replay continues with the next line.
///
/// # Errors
///
/// Returns `DeliveryError::Io` if the file cannot be opened or read.
pub async fn replay_file(
    client: &ForwardClient,
    target: &str,
    path: impl AsRef<Path>,
) -> Result<ReplaySummary> {
    let path = path.as_ref();
    info!(
        path = %path.display(),
        forward_target = %target,
        "sending contents of {}",
        path.display()
    );

    let mut lines = BufReader::new(File::open(path).await?).lines();
    let mut summary = ReplaySummary::default();
    let mut line_number = 0_usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            summary.skipped += 1;
            continue;
        }

        info!(line = line_number, "sending line {line_number}");
        trace!(line = line_number, content = %line, "line content");

        let outcome = match decode(line) {
            Ok(message) => {
                trace!(headers = ?message.headers, body = %message.body, "decoded line");
                client.post(target, &message).await
            },
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(response) => {
                info!(status = response.status_code, "POST {target} - {}", response.status_code);
                summary.sent += 1;
            },
            Err(e) => {
                error!(line = line_number, error = %e, "failed to send line {line_number}");
                summary.failed += 1;
            },
        }
    }

    info!(
        sent = summary.sent,
        failed = summary.failed,
        skipped = summary.skipped,
        "replay finished"
    );
    Ok(summary)
}
