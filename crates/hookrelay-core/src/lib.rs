//! Core event model and envelope codec.
//!
//! Provides the typed representation of frames received from the event
//! stream and the pure decoder that turns a forwarded webhook envelope into
//! request headers and a canonical body. Every other hookrelay crate builds
//! on these types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod events;

pub use codec::{decode, DecodedMessage, RESERVED_KEYS};
pub use error::{CodecError, Result};
pub use events::{EventKind, RawEvent};
