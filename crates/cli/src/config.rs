//! Configuration file for the `warden` CLI.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use warden_lock::LockConfig;
use warden_lock_redis::RedisConfig;

/// Top-level configuration, loaded from a TOML file.
///
/// ```toml
/// [redis]
/// url = "redis://cache:6379"
///
/// [lock]
/// prefix = "lock"
/// max_retries = 3
/// retry_delay_ms = 100
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct WardenConfig {
    /// Lock service defaults.
    #[serde(default)]
    pub lock: LockConfig,
    /// Redis connection settings.
    #[serde(default)]
    pub redis: RedisSettings,
}

/// Redis connection settings as written in the configuration file.
#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    /// Connection URL. Defaults to `redis://127.0.0.1:6379`.
    #[serde(default = "default_url")]
    pub url: String,
    /// Pool size. Defaults to 10.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Pooled connection timeout in seconds. Defaults to 5.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout_secs(),
        }
    }
}

impl RedisSettings {
    /// Convert into the backend configuration.
    pub fn to_redis_config(&self) -> RedisConfig {
        RedisConfig::new(&self.url)
            .with_pool_size(self.pool_size)
            .with_connection_timeout(Duration::from_secs(self.connection_timeout_secs))
    }
}

fn default_url() -> String {
    RedisConfig::default().url
}

fn default_pool_size() -> usize {
    RedisConfig::default().pool_size
}

fn default_connection_timeout_secs() -> u64 {
    RedisConfig::default().connection_timeout.as_secs()
}

impl WardenConfig {
    /// Load configuration from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        Self::parse(&contents)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply command-line overrides on top of the file values.
    #[must_use]
    pub fn with_overrides(mut self, redis_url: Option<String>, prefix: Option<String>) -> Self {
        if let Some(url) = redis_url {
            self.redis.url = url;
        }
        if let Some(prefix) = prefix {
            self.lock.prefix = prefix;
        }
        self
    }
}
