use std::time::Duration;

use clap::Args;
use warden_lock::{DistributedLockService, LockToken};

use crate::OutputFormat;

/// Exit status when the token no longer owns the lock.
const EXIT_NOT_OWNED: i32 = 1;

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Resource key, without the lock prefix.
    pub key: String,
    /// Holder token returned by `acquire`.
    pub token: String,
}

#[derive(Args, Debug)]
pub struct ExtendArgs {
    /// Resource key, without the lock prefix.
    pub key: String,
    /// Holder token returned by `acquire`.
    pub token: String,
    /// New lease in milliseconds. Defaults to the configured lease.
    #[arg(long)]
    pub lease_ms: Option<u64>,
}

fn exit_code(done: bool) -> Option<i32> {
    (!done).then_some(EXIT_NOT_OWNED)
}

fn report(action: &str, key: &str, done: bool, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({ "key": key, "action": action, "ok": done });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text if done => println!("Lock {key} {action}."),
        OutputFormat::Text => {
            eprintln!("Lock {key} not {action}: expired or held by another token.");
        }
    }
    if let Some(code) = exit_code(done) {
        std::process::exit(code);
    }
    Ok(())
}

pub async fn run_release(
    locks: &DistributedLockService,
    args: &ReleaseArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let token = LockToken::from(args.token.as_str());
    let released = locks.release(&args.key, &token).await;
    report("released", &args.key, released, format)
}

async fn extend(locks: &DistributedLockService, args: &ExtendArgs) -> bool {
    let token = LockToken::from(args.token.as_str());
    let lease = args
        .lease_ms
        .map_or_else(|| locks.config().default_lease(), Duration::from_millis);
    locks.extend_lock(&args.key, &token, lease).await
}

pub async fn run_extend(
    locks: &DistributedLockService,
    args: &ExtendArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let extended = extend(locks, args).await;
    report("extended", &args.key, extended, format)
}
