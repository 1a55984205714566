//! Distributed mutual-exclusion locks for Warden.
//!
//! This crate provides the [`LockStore`] capability trait that storage
//! backends implement, and the [`DistributedLockService`] built on it:
//! acquire with retries, ownership-safe release and extend, introspection,
//! break-glass forced release, and [`with_lock`] scoped execution. The
//! [`wrapper`] module adds declarative locking driven by key templates.
//!
//! Backends live in sibling crates: `warden-lock-memory` and
//! `warden-lock-redis`.
//!
//! [`with_lock`]: DistributedLockService::with_lock

pub mod config;
pub mod error;
pub mod key;
pub mod service;
pub mod store;
pub mod testing;
pub mod ttl;
pub mod wrapper;

pub use config::{LockConfig, RetryPolicy};
pub use error::LockError;
pub use key::LockToken;
pub use service::DistributedLockService;
pub use store::LockStore;
pub use ttl::LockTtl;
pub use wrapper::{KeyTemplate, LockArgs, LockProvider, LockSpec, Locked, locked, locked_with};
