//! Error types for dispatch, forwarding and persistence.
//!
//! Every variant here is contained by the component that produced it: a
//! worker logs the error for the event it was processing and moves on, and
//! a failed forward is never retried.

use std::fmt;

use hookrelay_core::CodecError;
use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error conditions raised while processing or forwarding events.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The event payload could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Forward target could not be reached.
    #[error("error sending message to {url}: {message}")]
    Network {
        /// Target URL
        url: String,
        /// Description of the transport failure
        message: String,
    },

    /// Forward request exceeded the client timeout.
    #[error("request to {url} timed out after {timeout_seconds}s")]
    Timeout {
        /// Target URL
        url: String,
        /// Configured client timeout
        timeout_seconds: u64,
    },

    /// Invalid client or pool configuration.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Description of the problem
        message: String,
    },

    /// The dispatch queue no longer accepts events.
    #[error("dispatch pool is closed")]
    PoolClosed,

    /// The persistence writer failed or is gone.
    #[error("persistence error: {message}")]
    Persistence {
        /// Description of the failure
        message: String,
    },

    /// A worker task panicked outside per-event processing.
    #[error("worker {worker_id} panicked: {error}")]
    WorkerPanic {
        /// Identifier of the worker
        worker_id: usize,
        /// Panic description
        error: String,
    },

    /// A message handler panicked while processing one event.
    #[error("handler panicked: {message}")]
    HandlerPanic {
        /// Panic payload, when it was a string
        message: String,
    },

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    /// Creates a network error for a target URL.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network { url: url.into(), message: message.into() }
    }

    /// Creates a timeout error for a target URL.
    pub fn timeout(url: impl Into<String>, timeout_seconds: u64) -> Self {
        Self::Timeout { url: url.into(), timeout_seconds }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into() }
    }

    /// Whether this error came from the HTTP transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

/// Category of a delivery error, used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed event payload.
    Payload,
    /// Network or timeout failure.
    Transport,
    /// Configuration problems.
    Configuration,
    /// Persistence and local I/O.
    Storage,
    /// Pool shutdown or panics.
    Internal,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::Codec(_) => Self::Payload,
            DeliveryError::Network { .. } | DeliveryError::Timeout { .. } => Self::Transport,
            DeliveryError::Configuration { .. } => Self::Configuration,
            DeliveryError::Persistence { .. } | DeliveryError::Io(_) => Self::Storage,
            DeliveryError::PoolClosed
            | DeliveryError::WorkerPanic { .. }
            | DeliveryError::HandlerPanic { .. } => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload => write!(f, "payload"),
            Self::Transport => write!(f, "transport"),
            Self::Configuration => write!(f, "configuration"),
            Self::Storage => write!(f, "storage"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
