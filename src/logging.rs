//! Process-wide tracing setup.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const RELAY_TARGETS: [&str; 4] =
    ["hookrelay", "hookrelay_core", "hookrelay_delivery", "hookrelay_stream"];

/// Filter directive for a `-v` count.
///
/// No flag logs at info. One flag turns on debug output for the relay's own
/// crates; two or more add trace output and debug output from dependencies.
pub fn directive_for(verbosity: u8) -> String {
    let (base, relay) = match verbosity {
        0 => return "info".to_string(),
        1 => ("info", "debug"),
        _ => ("debug", "trace"),
    };

    let mut directive = base.to_string();
    for target in RELAY_TARGETS {
        directive.push_str(&format!(",{target}={relay}"));
    }
    directive
}

/// Installs the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over the `-v` count.
pub fn init(verbosity: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive_for(verbosity))
            .context("invalid log filter directive")?,
    };

    let fmt_layer = fmt::layer().with_target(true).with_thread_names(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_increasing_detail() {
        assert_eq!(directive_for(0), "info");
        assert!(directive_for(1).starts_with("info,"));
        assert!(directive_for(1).contains("hookrelay_stream=debug"));
        assert!(directive_for(2).starts_with("debug,"));
        assert!(directive_for(2).contains("hookrelay_delivery=trace"));
        assert_eq!(directive_for(2), directive_for(9));
    }

    #[test]
    fn directives_parse() {
        for verbosity in 0..3 {
            assert!(EnvFilter::try_new(directive_for(verbosity)).is_ok());
        }
    }
}
