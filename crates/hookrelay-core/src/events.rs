//! Frames received from the event stream.
//!
//! A `RawEvent` is created by a stream receiver for every frame it reads and
//! is consumed exactly once by a dispatch worker. Only `message` frames carry
//! a meaningful payload; the other kinds are control traffic from the relay
//! service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a frame, taken from its SSE `event` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Keep-alive heartbeat.
    Ping,
    /// Forwarded webhook envelope.
    Message,
    /// Stream attached and ready.
    Ready,
    /// Error reported by the relay service.
    Error,
    /// Any kind this client does not know about, including `close`.
    Other(String),
}

impl EventKind {
    /// Parses an SSE event type. An empty type is the SSE default, `message`.
    pub fn parse(kind: &str) -> Self {
        match kind {
            "ping" => Self::Ping,
            "message" | "" => Self::Message,
            "ready" => Self::Ready,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Message => "message",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(kind: &str) -> Self {
        Self::parse(kind)
    }
}

impl From<String> for EventKind {
    fn from(kind: String) -> Self {
        Self::parse(&kind)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One frame received from the event stream.
///
/// Immutable once constructed. The persistence writer copies `data` for
/// `message` frames; everything else is discarded after processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Frame kind.
    pub kind: EventKind,
    /// SSE `id` field, empty when the frame carried none.
    pub id: String,
    /// Raw `data` payload.
    pub data: String,
}

impl RawEvent {
    /// Creates a frame from its parts.
    pub fn new(kind: impl Into<EventKind>, id: impl Into<String>, data: impl Into<String>) -> Self {
        Self { kind: kind.into(), id: id.into(), data: data.into() }
    }

    /// Creates a `message` frame carrying an envelope.
    pub fn message(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(EventKind::Message, id, data)
    }

    /// Creates a `ping` frame.
    pub fn ping(id: impl Into<String>) -> Self {
        Self::new(EventKind::Ping, id, String::new())
    }

    /// Creates a `ready` frame.
    pub fn ready() -> Self {
        Self::new(EventKind::Ready, String::new(), String::new())
    }

    /// Whether this frame tells the receiver the stream is closing.
    pub fn signals_close(&self) -> bool {
        matches!(&self.kind, EventKind::Other(kind) if kind == "close")
    }

    /// Renders the frame back into SSE text form.
    ///
    /// Used for debug logging; multi-line data is split into one `data:` line
    /// per line, as on the wire.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if !self.id.is_empty() {
            out.push_str("id: ");
            out.push_str(&self.id);
            out.push('\n');
        }
        out.push_str("event: ");
        out.push_str(self.kind.as_str());
        out.push('\n');
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} event", self.kind)?;
        if !self.id.is_empty() {
            write!(f, " {}", self.id)?;
        }
        if !self.data.is_empty() {
            write!(f, ": {}", self.data)?;
        }
        Ok(())
    }
}
