//! Relay for webhook payloads delivered over server-sent events.
//!
//! The binary wires the workspace crates together: [`cli`] parses the
//! command line, [`config`] layers file, environment and flag settings,
//! [`logging`] installs the subscriber and [`relay`] runs the receive,
//! dispatch and persist pipeline until interrupted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod logging;
pub mod relay;

pub use config::{ConfigOverrides, RelayConfig};
pub use relay::{run_relay, RelaySettings, ShutdownReport};
