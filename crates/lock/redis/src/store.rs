//! Redis-backed lock store.
//!
//! [`RedisLockStore`] implements [`LockStore`] on a single logical Redis
//! endpoint:
//!
//! - **Acquire** uses `SET key token NX PX ttl`, so the record is created with
//!   its lease in one command.
//! - **Compare-and-delete** and **compare-and-extend** run as Lua scripts.
//!   Redis executes a script atomically, so the `GET` and the following
//!   `DEL`/`PEXPIRE` cannot interleave with another client.
//!
//! # Guarantees
//!
//! Against a standalone Redis instance this gives full mutual exclusion as
//! long as the lease outlives the critical section.
//!
//! Replication in Sentinel and Cluster deployments is asynchronous: if the
//! master fails after a lock is written but before it reaches a replica, the
//! promoted replica has no record and a second holder can acquire the same
//! key. Use this backend where an occasional duplicate during failover is
//! tolerable, or point it at a standalone instance.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, Script};
use tracing::debug;

use warden_lock::error::LockError;
use warden_lock::store::LockStore;
use warden_lock::ttl::LockTtl;

use crate::config::RedisConfig;
use crate::scripts;

/// Redis-backed implementation of [`LockStore`].
///
/// See the [module-level documentation](self) for consistency guarantees
/// during failover.
pub struct RedisLockStore {
    pool: Pool,
    set_if_absent: Script,
    compare_and_delete: Script,
    compare_and_set_expiry: Script,
}

impl RedisLockStore {
    /// Create a new `RedisLockStore` from the provided configuration.
    ///
    /// The pool connects lazily; an unreachable server surfaces on the first
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, LockError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| LockError::Connection(e.to_string()))?
            .map_err(|e| LockError::Connection(e.to_string()))?;

        debug!(pool_size = config.pool_size, "redis lock store pool created");

        Ok(Self {
            pool,
            set_if_absent: Script::new(scripts::SET_IF_ABSENT),
            compare_and_delete: Script::new(scripts::COMPARE_AND_DELETE),
            compare_and_set_expiry: Script::new(scripts::COMPARE_AND_SET_EXPIRY),
        })
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, LockError> {
        self.pool
            .get()
            .await
            .map_err(|e| LockError::Connection(e.to_string()))
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

fn backend(e: &redis::RedisError) -> LockError {
    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        LockError::Connection(e.to_string())
    } else {
        LockError::Backend(e.to_string())
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut conn = self.conn().await?;
        let result: i64 = self
            .set_if_absent
            .key(key)
            .arg(value)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| backend(&e))?;
        Ok(result == 1)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, LockError> {
        let mut conn = self.conn().await?;
        let result: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| backend(&e))?;
        Ok(result == 1)
    }

    async fn compare_and_set_expiry(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut conn = self.conn().await?;
        let result: i64 = self
            .compare_and_set_expiry
            .key(key)
            .arg(expected)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| backend(&e))?;
        Ok(result == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool, LockError> {
        let mut conn = self.conn().await?;
        let exists: bool = conn.exists(key).await.map_err(|e| backend(&e))?;
        Ok(exists)
    }

    async fn remaining_ttl(&self, key: &str) -> Result<LockTtl, LockError> {
        let mut conn = self.conn().await?;
        let ms: i64 = conn.pttl(key).await.map_err(|e| backend(&e))?;
        Ok(LockTtl::from_millis(ms))
    }

    async fn delete(&self, key: &str) -> Result<bool, LockError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await.map_err(|e| backend(&e))?;
        Ok(removed > 0)
    }
}
