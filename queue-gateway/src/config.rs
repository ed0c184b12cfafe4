//! Configuration for the gateway and its listener

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Gateway configuration, read once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Broker URL (`memory://...` or `nats://host:port`)
    pub broker_url: String,

    /// Default destination for outbound requests
    pub write_destination: Option<String>,

    /// Destination replies are read from
    pub read_destination: Option<String>,

    /// Destination consumed by the queue listener
    pub listener_destination: Option<String>,

    /// Receive timeout (milliseconds)
    pub timeout_ms: u64,

    /// Upper bound on a single transport receive attempt (milliseconds)
    pub poll_wait_ms: u64,

    /// Pause between empty receive attempts (milliseconds)
    pub poll_backoff_ms: u64,

    /// Listener consumers kept running at all times
    pub concurrent_consumers: usize,

    /// Listener consumers allowed under load
    pub max_concurrent_consumers: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            broker_url: "memory://local".to_string(),
            write_destination: Some("courier.request".to_string()),
            read_destination: Some("courier.response".to_string()),
            listener_destination: Some("courier.inbound".to_string()),
            timeout_ms: 5_000,
            poll_wait_ms: 100,
            poll_backoff_ms: 5,
            concurrent_consumers: 1,
            max_concurrent_consumers: 4,
        }
    }
}

impl GatewayConfig {
    /// Receive timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Per-attempt transport wait
    pub fn poll_wait(&self) -> Duration {
        Duration::from_millis(self.poll_wait_ms)
    }

    /// Pause between empty attempts
    pub fn poll_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_backoff_ms)
    }

    /// Check invariants the gateway and listener rely on
    pub fn validate(&self) -> Result<()> {
        if self.broker_url.trim().is_empty() {
            return Err(Error::Config("broker_url must not be empty".to_string()));
        }

        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be > 0".to_string()));
        }

        if self.poll_wait_ms == 0 && self.poll_backoff_ms == 0 {
            return Err(Error::Config(
                "poll_wait_ms and poll_backoff_ms cannot both be 0".to_string(),
            ));
        }

        if self.concurrent_consumers == 0 {
            return Err(Error::Config("concurrent_consumers must be > 0".to_string()));
        }

        if self.max_concurrent_consumers < self.concurrent_consumers {
            return Err(Error::Config(format!(
                "max_concurrent_consumers ({}) must be >= concurrent_consumers ({})",
                self.max_concurrent_consumers, self.concurrent_consumers
            )));
        }

        for (name, destination) in [
            ("write_destination", &self.write_destination),
            ("read_destination", &self.read_destination),
            ("listener_destination", &self.listener_destination),
        ] {
            if matches!(destination, Some(d) if d.trim().is_empty()) {
                return Err(Error::Config(format!("{} must not be blank", name)));
            }
        }

        Ok(())
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse TOML; missing keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GatewayConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = GatewayConfig::default();

        if let Ok(url) = std::env::var("GATEWAY_BROKER_URL") {
            config.broker_url = url;
        }

        if let Ok(dest) = std::env::var("GATEWAY_WRITE_DESTINATION") {
            config.write_destination = Some(dest);
        }

        if let Ok(dest) = std::env::var("GATEWAY_READ_DESTINATION") {
            config.read_destination = Some(dest);
        }

        if let Ok(dest) = std::env::var("GATEWAY_LISTENER_DESTINATION") {
            config.listener_destination = Some(dest);
        }

        if let Some(ms) = env_number("GATEWAY_TIMEOUT_MS")? {
            config.timeout_ms = ms;
        }

        if let Some(ms) = env_number("GATEWAY_POLL_WAIT_MS")? {
            config.poll_wait_ms = ms;
        }

        if let Some(ms) = env_number("GATEWAY_POLL_BACKOFF_MS")? {
            config.poll_backoff_ms = ms;
        }

        if let Some(n) = env_number("GATEWAY_CONCURRENT_CONSUMERS")? {
            config.concurrent_consumers = n;
        }

        if let Some(n) = env_number("GATEWAY_MAX_CONCURRENT_CONSUMERS")? {
            config.max_concurrent_consumers = n;
        }

        config.validate()?;
        Ok(config)
    }
}

fn env_number<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
