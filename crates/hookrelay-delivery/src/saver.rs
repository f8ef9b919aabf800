//! Serial persistence writer for raw messages.
//!
//! One task owns the output file for its whole lifetime and appends lines in
//! the order they were queued. Producers only ever touch the queue, so no
//! locking is needed around the file and writes can never interleave.

use std::path::{Path, PathBuf};

use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{error, info, trace, warn};

use crate::error::{DeliveryError, Result};

/// Item on the writer queue.
#[derive(Debug)]
enum SaveCommand {
    Line(String),
    Stop,
}

/// Owner of the persistence writer task.
///
/// Constructed disabled (no file target) or bound to a file opened in append
/// mode. Producers get a cloneable [`SaveHandle`]; only `stop_and_wait`
/// ends the writer.
#[derive(Debug)]
pub struct Saver {
    path: Option<PathBuf>,
    sender: Option<mpsc::UnboundedSender<SaveCommand>>,
    writer: Option<JoinHandle<u64>>,
}

/// Cloneable producer side of a [`Saver`].
#[derive(Debug, Clone, Default)]
pub struct SaveHandle {
    sender: Option<mpsc::UnboundedSender<SaveCommand>>,
}

impl Saver {
    /// Creates a saver that discards everything.
    pub fn disabled() -> Self {
        Self { path: None, sender: None, writer: None }
    }

    /// Opens `path` in append mode and starts the writer task.
    ///
    /// The file is created if missing; existing content is preserved.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Io` if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(file, path.clone(), receiver));

        Ok(Self { path: Some(path), sender: Some(sender), writer: Some(writer) })
    }

    /// Opens `path` when given, otherwise returns a disabled saver.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Io` if the file cannot be opened.
    pub async fn from_option(path: Option<impl AsRef<Path>>) -> Result<Self> {
        match path {
            Some(path) => Self::open(path).await,
            None => Ok(Self::disabled()),
        }
    }

    /// Whether a file target is configured.
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Returns the file target, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns a producer handle for workers.
    pub fn handle(&self) -> SaveHandle {
        SaveHandle { sender: self.sender.clone() }
    }

    /// Queues a line for writing. No-op when disabled.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Persistence` if the writer has stopped.
    pub fn save(&self, data: impl Into<String>) -> Result<()> {
        self.handle().save(data)
    }

    /// Queues the stop marker and waits for the writer to drain.
    ///
    /// Every line queued before this call is written before the file is
    /// closed. Returns the number of lines written.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Persistence` if the writer task panicked.
    pub async fn stop_and_wait(mut self) -> Result<u64> {
        let (Some(sender), Some(writer)) = (self.sender.take(), self.writer.take()) else {
            return Ok(0);
        };

        // The writer only exits on Stop, so the send cannot fail unless it panicked.
        let _ = sender.send(SaveCommand::Stop);
        drop(sender);

        let written = writer
            .await
            .map_err(|e| DeliveryError::persistence(format!("writer task failed: {e}")))?;
        info!(lines = written, path = ?self.path, "persistence writer stopped");
        Ok(written)
    }
}

impl Drop for Saver {
    fn drop(&mut self) {
        if let Some(writer) = &self.writer {
            if !writer.is_finished() {
                warn!(
                    path = ?self.path,
                    "Saver dropped without stop_and_wait(); queued lines may not reach disk"
                );
            }
        }
    }
}

impl SaveHandle {
    /// Queues a line for writing. No-op when persistence is disabled.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Persistence` if the writer has stopped.
    pub fn save(&self, data: impl Into<String>) -> Result<()> {
        let Some(sender) = &self.sender else {
            return Ok(());
        };
        sender
            .send(SaveCommand::Line(data.into()))
            .map_err(|_| DeliveryError::persistence("persistence writer has stopped"))
    }

    /// Whether lines sent through this handle are persisted.
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }
}

async fn run_writer(
    mut file: File,
    path: PathBuf,
    mut receiver: mpsc::UnboundedReceiver<SaveCommand>,
) -> u64 {
    let mut written = 0;

    while let Some(command) = receiver.recv().await {
        match command {
            SaveCommand::Stop => break,
            SaveCommand::Line(line) => {
                trace!(line = %line, "writing to disk");
                let mut record = line.into_bytes();
                record.push(b'\n');
                match write_record(&mut file, &record).await {
                    Ok(()) => written += 1,
                    Err(e) => error!(path = %path.display(), error = %e, "failed to write line"),
                }
            },
        }
    }

    if let Err(e) = file.flush().await {
        error!(path = %path.display(), error = %e, "failed to flush on close");
    }
    written
}

async fn write_record(file: &mut File, record: &[u8]) -> std::io::Result<()> {
    file.write_all(record).await?;
    file.flush().await
}
