//! Warden CLI
//!
//! Operator tooling for inspecting and managing distributed locks.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};
use warden_lock::DistributedLockService;
use warden_lock_redis::RedisLockStore;

use crate::config::WardenConfig;

/// Warden CLI: inspect and manage distributed locks.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "WARDEN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Redis connection URL, overriding the configuration file.
    #[arg(long, env = "WARDEN_REDIS_URL", global = true)]
    redis_url: Option<String>,

    /// Lock key prefix, overriding the configuration file.
    #[arg(long, env = "WARDEN_LOCK_PREFIX", global = true)]
    prefix: Option<String>,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show whether a resource is locked and its remaining lease.
    Status(commands::status::StatusArgs),
    /// Acquire a lock and print its holder token.
    Acquire(commands::acquire::AcquireArgs),
    /// Release a lock held by a token.
    Release(commands::release::ReleaseArgs),
    /// Extend the lease of a lock held by a token.
    Extend(commands::release::ExtendArgs),
    /// Delete a lock regardless of its holder (break-glass).
    ForceRelease(commands::force_release::ForceReleaseArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = WardenConfig::load(cli.config.as_deref())?
        .with_overrides(cli.redis_url.clone(), cli.prefix.clone());
    let store = RedisLockStore::new(&config.redis.to_redis_config())?;
    debug!(prefix = %config.lock.prefix, "lock service configured");
    let locks = DistributedLockService::with_config(Arc::new(store), config.lock);

    match cli.command {
        Command::Status(args) => commands::status::run(&locks, &args, &cli.format).await,
        Command::Acquire(args) => commands::acquire::run(&locks, &args, &cli.format).await,
        Command::Release(args) => commands::release::run_release(&locks, &args, &cli.format).await,
        Command::Extend(args) => commands::release::run_extend(&locks, &args, &cli.format).await,
        Command::ForceRelease(args) => {
            commands::force_release::run(&locks, &args, &cli.format).await
        }
    }
}
