//! The distributed lock service.
//!
//! [`DistributedLockService`] issues the atomic operations of a
//! [`LockStore`] in the right order to provide mutual exclusion over named
//! resources:
//!
//! - **Acquire** sets `prefix:key` to a fresh [`LockToken`] only if the key is
//!   absent, with the lease as expiry, retrying on contention.
//! - **Release** and **extend** are compare-and-act operations on the store,
//!   so a holder whose lease already expired can never delete or prolong a
//!   lock that now belongs to someone else.
//! - **Lease expiry** is the only deadlock prevention: a crashed holder's
//!   record disappears on its own.
//!
//! The service is stateless between calls. Concurrent waiters race with no
//! fairness guarantee; whichever `set_if_absent` lands first wins.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use warden_lock::DistributedLockService;
//! use warden_lock_memory::MemoryLockStore;
//!
//! let service = DistributedLockService::new(Arc::new(MemoryLockStore::new()));
//!
//! let order = service
//!     .with_lock("order:42", Duration::from_secs(5), || async {
//!         // Critical section...
//!         Ok::<_, warden_lock::LockError>(42)
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::config::{LockConfig, RetryPolicy};
use crate::error::LockError;
use crate::key::{LockToken, render_key};
use crate::store::LockStore;
use crate::ttl::LockTtl;

/// Distributed mutual-exclusion service on top of a [`LockStore`].
#[derive(Clone)]
pub struct DistributedLockService {
    store: Arc<dyn LockStore>,
    config: LockConfig,
}

impl DistributedLockService {
    /// Create a service with the default configuration.
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self::with_config(store, LockConfig::default())
    }

    /// Create a service with an explicit configuration.
    pub fn with_config(store: Arc<dyn LockStore>, config: LockConfig) -> Self {
        Self { store, config }
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Build the namespaced store key for a resource.
    fn lock_key(&self, key: &str) -> String {
        render_key(&self.config.prefix, key)
    }

    /// Acquire the lock on `key` using the configured retry policy.
    ///
    /// Returns the holder token needed to release or extend the lock.
    pub async fn acquire(&self, key: &str, lease: Duration) -> Result<LockToken, LockError> {
        self.acquire_with(key, lease, self.config.retry_policy())
            .await
    }

    /// Acquire the lock on `key`, making up to `policy.max_retries + 1`
    /// attempts separated by `policy.retry_delay`.
    ///
    /// Store errors count as failed attempts and are retried under the same
    /// budget.
    ///
    /// # Errors
    ///
    /// - [`LockError::InvalidLease`] if `lease` is zero.
    /// - [`LockError::AcquisitionFailed`] once every attempt failed.
    pub async fn acquire_with(
        &self,
        key: &str,
        lease: Duration,
        policy: RetryPolicy,
    ) -> Result<LockToken, LockError> {
        let attempt = Acquisition::new(key, self.lock_key(key), lease, policy)?;
        let total = policy.attempts();

        for n in 1..=total {
            match self
                .store
                .set_if_absent(&attempt.store_key, attempt.token.as_str(), attempt.lease)
                .await
            {
                Ok(true) => {
                    debug!(key, attempt = n, lease = ?attempt.lease, "lock acquired");
                    return Ok(attempt.token);
                }
                Ok(false) => {
                    debug!(key, attempt = n, "lock held by another owner");
                }
                Err(e) => {
                    warn!(key, attempt = n, error = %e, "lock store error during acquire");
                }
            }

            if n < total {
                debug!(key, attempt = n, delay = ?policy.retry_delay, "lock busy, retrying");
                if !policy.retry_delay.is_zero() {
                    tokio::time::sleep(policy.retry_delay).await;
                }
            }
        }

        debug!(key, attempts = total, "lock acquisition failed");
        Err(LockError::AcquisitionFailed {
            key: key.to_owned(),
            attempts: total,
        })
    }

    /// Make a single acquisition attempt without waiting.
    ///
    /// Returns `Ok(None)` when the lock is held by someone else or the store
    /// could not be reached.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidLease`] if `lease` is zero.
    pub async fn try_acquire(
        &self,
        key: &str,
        lease: Duration,
    ) -> Result<Option<LockToken>, LockError> {
        match self.acquire_with(key, lease, RetryPolicy::none()).await {
            Ok(token) => Ok(Some(token)),
            Err(LockError::AcquisitionFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Release the lock on `key` if it is still held by `token`.
    ///
    /// Returns `false` when the lock is missing, held by another owner, or
    /// the store failed. Never errors, so it is safe on cleanup paths.
    pub async fn release(&self, key: &str, token: &LockToken) -> bool {
        match self
            .store
            .compare_and_delete(&self.lock_key(key), token.as_str())
            .await
        {
            Ok(true) => {
                debug!(key, "lock released");
                true
            }
            Ok(false) => {
                debug!(key, "lock not released: expired or held by another owner");
                false
            }
            Err(e) => {
                warn!(key, error = %e, "failed to release lock");
                false
            }
        }
    }

    /// Reset the lease on `key` to `lease` if it is still held by `token`.
    ///
    /// Returns `false` when the lock is missing, held by another owner, the
    /// lease is zero, or the store failed.
    pub async fn extend_lock(&self, key: &str, token: &LockToken, lease: Duration) -> bool {
        if lease.is_zero() {
            warn!(key, "refusing to extend lock with a zero lease");
            return false;
        }

        match self
            .store
            .compare_and_set_expiry(&self.lock_key(key), token.as_str(), lease)
            .await
        {
            Ok(true) => {
                debug!(key, lease = ?lease, "lock extended");
                true
            }
            Ok(false) => {
                debug!(key, "lock not extended: expired or held by another owner");
                false
            }
            Err(e) => {
                warn!(key, error = %e, "failed to extend lock");
                false
            }
        }
    }

    /// Run `op` while holding the lock on `key`, using the configured retry
    /// policy. See [`with_lock_retry`](Self::with_lock_retry).
    pub async fn with_lock<F, Fut, T, E>(&self, key: &str, lease: Duration, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        self.with_lock_retry(key, lease, self.config.retry_policy(), op)
            .await
    }

    /// Acquire the lock on `key`, run `op`, and release the lock.
    ///
    /// Release is attempted exactly once after `op` finishes, whether it
    /// returned `Ok`, returned `Err`, or panicked; the result or panic of
    /// `op` is passed through unchanged. If acquisition fails `op` is never
    /// invoked.
    ///
    /// Dropping the returned future while `op` is running skips the release;
    /// the record is then freed by lease expiry.
    pub async fn with_lock_retry<F, Fut, T, E>(
        &self,
        key: &str,
        lease: Duration,
        policy: RetryPolicy,
        op: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let token = self.acquire_with(key, lease, policy).await?;

        let outcome = AssertUnwindSafe(async move { op().await })
            .catch_unwind()
            .await;

        self.release(key, &token).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Check whether `key` is currently locked by anyone.
    pub async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        self.store.exists(&self.lock_key(key)).await
    }

    /// Remaining lease on `key`.
    pub async fn lock_ttl(&self, key: &str) -> Result<LockTtl, LockError> {
        self.store.remaining_ttl(&self.lock_key(key)).await
    }

    /// Delete the lock on `key` regardless of who holds it.
    ///
    /// This deliberately breaks mutual exclusion and is meant for operators
    /// clearing a stuck lock after confirming its holder is dead. Returns
    /// `false` if the key did not exist or the store failed.
    pub async fn force_release_lock(&self, key: &str) -> bool {
        warn!(key, "force-releasing lock");
        match self.store.delete(&self.lock_key(key)).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(key, error = %e, "failed to force-release lock");
                false
            }
        }
    }
}

/// A single call to acquire: resource key, fresh token, lease and budget.
struct Acquisition {
    store_key: String,
    token: LockToken,
    lease: Duration,
}

impl Acquisition {
    fn new(
        key: &str,
        store_key: String,
        lease: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, LockError> {
        if lease.is_zero() {
            warn!(key, "rejecting lock acquisition with a zero lease");
            return Err(LockError::InvalidLease(lease));
        }
        debug!(
            key,
            max_retries = policy.max_retries,
            "starting lock acquisition"
        );
        Ok(Self {
            store_key,
            token: LockToken::generate(),
            lease,
        })
    }
}
