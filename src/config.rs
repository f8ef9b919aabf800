//! Relay configuration.
//!
//! Loaded in priority order, lowest first:
//! 1. Built-in defaults
//! 2. Configuration file (`hookrelay.toml`, or the file given with `--config`)
//! 3. Environment variables prefixed `HOOKRELAY_` (e.g. `HOOKRELAY_WORKERS`)
//! 4. Command-line flags

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use hookrelay_delivery::{ClientConfig, PoolConfig};
use hookrelay_stream::{ReceiverConfig, SseConfig, SupervisorConfig};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "hookrelay.toml";
const ENV_PREFIX: &str = "HOOKRELAY_";

/// Complete relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Number of dispatch workers.
    ///
    /// Environment variable: `HOOKRELAY_WORKERS`
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Seconds between receiver replacements; `0` disables replacement.
    ///
    /// Environment variable: `HOOKRELAY_RECONNECT_INTERVAL_SECS`
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
    /// Pause before a receiver reconnects after a failed session.
    ///
    /// Environment variable: `HOOKRELAY_RECONNECT_DELAY_MS`
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Dispatch queue capacity; unset means unbounded.
    ///
    /// Environment variable: `HOOKRELAY_QUEUE_CAPACITY`
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// Forward request timeout in seconds.
    ///
    /// Environment variable: `HOOKRELAY_REQUEST_TIMEOUT_SECS`
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// User agent for stream requests, and for forwards whose envelope
    /// carries none.
    ///
    /// Environment variable: `HOOKRELAY_USER_AGENT`
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Upper bound in seconds on each shutdown drain step.
    ///
    /// Environment variable: `HOOKRELAY_SHUTDOWN_TIMEOUT_SECS`
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    /// `--workers`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// `--reconnect`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_interval_secs: Option<u64>,
}

impl RelayConfig {
    /// Loads and validates configuration from every layer.
    ///
    /// `config_path` replaces the default `hookrelay.toml`; unlike the
    /// default, an explicit file must exist.
    pub fn load(config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let figment = Self::figment(config_path)?.merge(Serialized::defaults(overrides));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_path: Option<&Path>) -> Result<Figment> {
        let file = match config_path {
            Some(path) if !path.is_file() => {
                anyhow::bail!("configuration file {} not found", path.display())
            },
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILE),
        };

        Ok(Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            anyhow::bail!("workers must be greater than 0");
        }

        if self.queue_capacity == Some(0) {
            anyhow::bail!("queue_capacity must be greater than 0 when set");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.shutdown_timeout_secs == 0 {
            anyhow::bail!("shutdown_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Dispatch pool configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig { worker_count: self.workers, queue_capacity: self.queue_capacity }
    }

    /// Forwarding client configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
            ..ClientConfig::default()
        }
    }

    /// SSE client configuration.
    pub fn sse_config(&self) -> SseConfig {
        SseConfig { user_agent: self.user_agent.clone(), ..SseConfig::default() }
    }

    /// Reconnect supervisor configuration.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            reconnect_interval: (self.reconnect_interval_secs > 0)
                .then(|| Duration::from_secs(self.reconnect_interval_secs)),
            receiver: ReceiverConfig {
                reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            },
        }
    }

    /// Upper bound on each shutdown drain step.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            queue_capacity: None,
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_workers() -> usize {
    hookrelay_delivery::DEFAULT_WORKER_COUNT
}

fn default_reconnect_interval_secs() -> u64 {
    hookrelay_stream::DEFAULT_RECONNECT_INTERVAL_SECS
}

fn default_reconnect_delay_ms() -> u64 {
    hookrelay_stream::DEFAULT_RECONNECT_DELAY_MS
}

fn default_request_timeout_secs() -> u64 {
    hookrelay_delivery::DEFAULT_TIMEOUT_SECONDS
}

fn default_user_agent() -> String {
    concat!("hookrelay/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers, 5);
        assert_eq!(config.reconnect_interval_secs, 3600);
        assert_eq!(config.queue_capacity, None);
    }

    #[test]
    fn layers_apply_in_priority_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                workers = 8
                reconnect_interval_secs = 600
                queue_capacity = 100
                "#,
            )?;
            jail.set_env("HOOKRELAY_WORKERS", "12");
            jail.set_env("HOOKRELAY_REQUEST_TIMEOUT_SECS", "5");

            let overrides =
                ConfigOverrides { workers: None, reconnect_interval_secs: Some(0) };
            let config = RelayConfig::load(None, &overrides).map_err(|e| e.to_string())?;

            assert_eq!(config.workers, 12);
            assert_eq!(config.reconnect_interval_secs, 0);
            assert_eq!(config.queue_capacity, Some(100));
            assert_eq!(config.request_timeout_secs, 5);
            assert_eq!(config.supervisor_config().reconnect_interval, None);
            Ok(())
        });
    }

    #[test]
    fn cli_flags_beat_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("HOOKRELAY_WORKERS", "12");

            let overrides = ConfigOverrides { workers: Some(2), reconnect_interval_secs: None };
            let config = RelayConfig::load(None, &overrides).map_err(|e| e.to_string())?;

            assert_eq!(config.workers, 2);
            assert_eq!(config.reconnect_interval_secs, 3600);
            Ok(())
        });
    }

    #[test]
    fn explicit_config_file_must_exist() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "workers = 3")?;

            let overrides = ConfigOverrides::default();
            let config = RelayConfig::load(Some(Path::new("custom.toml")), &overrides)
                .map_err(|e| e.to_string())?;
            assert_eq!(config.workers, 3);

            let missing = RelayConfig::load(Some(Path::new("missing.toml")), &overrides);
            assert!(missing.is_err());
            Ok(())
        });
    }

    #[test]
    fn validation_rejects_zero_values() {
        let zero_workers = RelayConfig { workers: 0, ..RelayConfig::default() };
        assert!(zero_workers.validate().is_err());

        let zero_capacity = RelayConfig { queue_capacity: Some(0), ..RelayConfig::default() };
        assert!(zero_capacity.validate().is_err());

        let zero_timeout = RelayConfig { request_timeout_secs: 0, ..RelayConfig::default() };
        assert!(zero_timeout.validate().is_err());

        let zero_shutdown = RelayConfig { shutdown_timeout_secs: 0, ..RelayConfig::default() };
        assert!(zero_shutdown.validate().is_err());
    }

    #[test]
    fn zero_workers_from_cli_fails_load() {
        Jail::expect_with(|_| {
            let overrides = ConfigOverrides { workers: Some(0), reconnect_interval_secs: None };
            assert!(RelayConfig::load(None, &overrides).is_err());
            Ok(())
        });
    }

    #[test]
    fn conversions_carry_values() {
        let config = RelayConfig {
            workers: 3,
            queue_capacity: Some(16),
            reconnect_delay_ms: 250,
            request_timeout_secs: 7,
            user_agent: "relay-test".to_string(),
            ..RelayConfig::default()
        };

        assert_eq!(config.pool_config(), PoolConfig { worker_count: 3, queue_capacity: Some(16) });
        assert_eq!(config.client_config().timeout, Duration::from_secs(7));
        assert_eq!(config.client_config().user_agent, "relay-test");
        assert_eq!(config.sse_config().user_agent, "relay-test");
        let supervisor = config.supervisor_config();
        assert_eq!(supervisor.reconnect_interval, Some(Duration::from_secs(3600)));
        assert_eq!(supervisor.receiver.reconnect_delay, Duration::from_millis(250));
    }
}
