use std::time::Duration;

use clap::Args;
use warden_lock::{DistributedLockService, LockError, LockToken, RetryPolicy};

use crate::OutputFormat;

/// Exit status when the lock stayed held through every attempt.
const EXIT_BUSY: i32 = 2;

#[derive(Args, Debug)]
pub struct AcquireArgs {
    /// Resource key, without the lock prefix.
    pub key: String,

    /// Lease in milliseconds. Defaults to the configured lease.
    #[arg(long)]
    pub lease_ms: Option<u64>,

    /// Additional attempts after the first. Defaults to the configured value.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Delay between attempts in milliseconds. Defaults to the configured value.
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,
}

impl AcquireArgs {
    fn policy(&self, default: RetryPolicy) -> RetryPolicy {
        RetryPolicy::new(
            self.retries.unwrap_or(default.max_retries),
            self.retry_delay_ms
                .map_or(default.retry_delay, Duration::from_millis),
        )
    }

    fn lease(&self, default: Duration) -> Duration {
        self.lease_ms.map_or(default, Duration::from_millis)
    }
}

/// Exit status for an acquisition error that is not a failure of the CLI itself.
fn exit_code(err: &LockError) -> Option<i32> {
    err.is_busy().then_some(EXIT_BUSY)
}

async fn acquire(
    locks: &DistributedLockService,
    args: &AcquireArgs,
) -> Result<(LockToken, Duration), LockError> {
    let config = locks.config();
    let policy = args.policy(config.retry_policy());
    let lease = args.lease(config.default_lease());
    let token = locks.acquire_with(&args.key, lease, policy).await?;
    Ok((token, lease))
}

pub async fn run(
    locks: &DistributedLockService,
    args: &AcquireArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let (token, lease) = match acquire(locks, args).await {
        Ok(acquired) => acquired,
        Err(e) => match exit_code(&e) {
            Some(code) => {
                eprintln!("{e}");
                std::process::exit(code);
            }
            None => return Err(e.into()),
        },
    };

    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "key": args.key,
                "token": token.as_str(),
                "lease_ms": u64::try_from(lease.as_millis()).unwrap_or(u64::MAX),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => println!("{token}"),
    }
    Ok(())
}
