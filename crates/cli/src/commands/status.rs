use clap::Args;
use serde::Serialize;
use warden_lock::{DistributedLockService, LockTtl};

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Resource key, without the lock prefix.
    pub key: String,
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    key: &'a str,
    locked: bool,
    ttl_ms: LockTtl,
}

pub async fn run(
    locks: &DistributedLockService,
    args: &StatusArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let locked = locks.is_locked(&args.key).await?;
    let ttl = locks.lock_ttl(&args.key).await?;

    match format {
        OutputFormat::Json => {
            let report = StatusReport {
                key: &args.key,
                locked,
                ttl_ms: ttl,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("Key:    {}", args.key);
            println!("Locked: {locked}");
            match ttl {
                LockTtl::Missing => println!("Lease:  -"),
                LockTtl::Persistent => println!("Lease:  no expiry"),
                LockTtl::Remaining(d) => println!("Lease:  {}ms remaining", d.as_millis()),
            }
        }
    }
    Ok(())
}
