use std::time::Duration;

use async_trait::async_trait;

use crate::error::LockError;
use crate::ttl::LockTtl;

/// Key-value capability the lock service is built on.
///
/// Keys passed to a store are already namespaced. Every operation must be a
/// single atomic step on the backend; in particular the compare-and-act
/// operations must never be implemented as a read followed by a separate
/// write from the client.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` with the given expiry, only if the key is absent.
    /// Returns `true` if the key was newly set.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError>;

    /// Delete `key` only if its current value equals `expected`.
    /// Returns `true` if the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, LockError>;

    /// Reset the expiry of `key` to `ttl`, only if its current value equals
    /// `expected`. Returns `true` if the expiry was updated.
    async fn compare_and_set_expiry(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, LockError>;

    /// Check whether `key` exists.
    async fn exists(&self, key: &str) -> Result<bool, LockError>;

    /// Remaining time-to-live of `key`.
    async fn remaining_ttl(&self, key: &str) -> Result<LockTtl, LockError>;

    /// Delete `key` unconditionally. Returns `true` if the key existed.
    async fn delete(&self, key: &str) -> Result<bool, LockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify object safety.
    fn _assert_dyn_lock_store(_: &dyn LockStore) {}
}
