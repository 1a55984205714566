use std::time::Duration;

use serde::Deserialize;

/// Retry behaviour for lock acquisition.
///
/// `max_retries` counts additional attempts, so a policy makes
/// `max_retries + 1` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay between consecutive attempts.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given retry budget and delay.
    #[must_use]
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// A single attempt with no delay.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total number of attempts this policy allows.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(default_max_retries(), Duration::from_millis(default_retry_delay_ms()))
    }
}

/// Configuration for the distributed lock service.
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Namespace prepended to every resource key. Defaults to `"lock"`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Default number of additional acquisition attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Default delay between acquisition attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Default lease for callers that do not pass one, in milliseconds.
    #[serde(default = "default_lease_ms")]
    pub default_lease_ms: u64,
}

impl LockConfig {
    /// Override the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Override the default retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.max_retries = policy.max_retries;
        self.retry_delay_ms = u64::try_from(policy.retry_delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The default retry policy described by this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    /// The default lease described by this configuration.
    #[must_use]
    pub fn default_lease(&self) -> Duration {
        Duration::from_millis(self.default_lease_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            default_lease_ms: default_lease_ms(),
        }
    }
}

fn default_prefix() -> String {
    "lock".to_owned()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_lease_ms() -> u64 {
    30_000
}
