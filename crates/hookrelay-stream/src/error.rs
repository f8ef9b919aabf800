//! Error types for stream reception.

use thiserror::Error;

/// Result type alias for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Transport-level failures of an event stream.
///
/// None of these end the process: a receiver logs them and reconnects.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The source could not be reached.
    #[error("failed to connect to {url}: {message}")]
    Connect {
        /// Source URL
        url: String,
        /// Description of the failure
        message: String,
    },

    /// The source answered with a non-success status.
    #[error("{url} responded with HTTP {status}")]
    Status {
        /// Source URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The stream broke while reading frames.
    #[error("stream transport error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
    },

    /// Invalid source or client configuration.
    #[error("invalid stream configuration: {message}")]
    Configuration {
        /// Description of the problem
        message: String,
    },
}

impl StreamError {
    /// Creates a connect error.
    pub fn connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect { url: url.into(), message: message.into() }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_format() {
        let error = StreamError::connect("https://smee.io/abc", "connection refused");
        assert_eq!(
            error.to_string(),
            "failed to connect to https://smee.io/abc: connection refused"
        );

        let status = StreamError::Status { url: "https://smee.io/abc".to_string(), status: 503 };
        assert_eq!(status.to_string(), "https://smee.io/abc responded with HTTP 503");
    }
}
