//! Redis lock store backend for Warden.
//!
//! This crate provides a Redis-backed implementation of the [`LockStore`]
//! trait from `warden-lock`.
//!
//! # Features
//!
//! - **Atomic acquisition**: `SET NX PX` creates the record and its lease in
//!   one command.
//! - **Ownership-checked release and extend**: Lua scripts compare the holder
//!   token and act in a single server-side step.
//! - **Connection pooling**: Uses `deadpool-redis` for efficient connection
//!   management.
//!
//! # Lock Consistency
//!
//! | Deployment | Mutual Exclusion | Notes |
//! |------------|------------------|-------|
//! | Single instance | Strong | Full mutual exclusion guaranteed |
//! | Sentinel | Weak | Lock may be lost during failover |
//! | Cluster | Weak | Lock may be lost during failover |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_lock::DistributedLockService;
//! use warden_lock_redis::{RedisConfig, RedisLockStore};
//!
//! let store = RedisLockStore::new(&RedisConfig::new("redis://localhost:6379"))?;
//! let locks = DistributedLockService::new(Arc::new(store));
//! ```
//!
//! [`LockStore`]: warden_lock::LockStore

mod config;
mod scripts;
pub mod store;

pub use config::RedisConfig;
pub use store::RedisLockStore;
