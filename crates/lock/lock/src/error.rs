use std::time::Duration;

use thiserror::Error;

/// Errors from lock store and distributed lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to acquire lock '{key}' after {attempts} attempts")]
    AcquisitionFailed { key: String, attempts: u32 },

    #[error("invalid lease duration: {0:?}")]
    InvalidLease(Duration),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LockError {
    /// Whether this error means "resource busy" rather than a system fault.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AcquisitionFailed { .. })
    }
}
