use clap::Args;
use warden_lock::DistributedLockService;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ForceReleaseArgs {
    /// Resource key, without the lock prefix.
    pub key: String,

    /// Confirm that the holder is dead and mutual exclusion may be broken.
    #[arg(long)]
    pub yes: bool,
}

pub async fn run(
    locks: &DistributedLockService,
    args: &ForceReleaseArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!(
            "force-release deletes the lock regardless of its holder; \
             confirm the holder process is dead and pass --yes"
        );
    }

    let removed = locks.force_release_lock(&args.key).await;
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({ "key": args.key, "removed": removed });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text if removed => println!("Lock {} force-released.", args.key),
        OutputFormat::Text => println!("No lock held on {}.", args.key),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use warden_lock_memory::MemoryLockStore;

    use super::*;

    #[tokio::test]
    async fn refuses_without_confirmation() {
        let locks = DistributedLockService::new(Arc::new(MemoryLockStore::new()));
        let _holder = locks
            .acquire("order:42", Duration::from_secs(60))
            .await
            .unwrap();

        let args = ForceReleaseArgs {
            key: "order:42".into(),
            yes: false,
        };
        let err = run(&locks, &args, &OutputFormat::Json).await.unwrap_err();

        assert!(err.to_string().contains("--yes"));
        assert!(locks.is_locked("order:42").await.unwrap());
    }

    #[tokio::test]
    async fn confirmed_release_removes_any_holder() {
        let locks = DistributedLockService::new(Arc::new(MemoryLockStore::new()));
        let _holder = locks
            .acquire("order:42", Duration::from_secs(60))
            .await
            .unwrap();

        let args = ForceReleaseArgs {
            key: "order:42".into(),
            yes: true,
        };
        run(&locks, &args, &OutputFormat::Json).await.unwrap();

        assert!(!locks.is_locked("order:42").await.unwrap());
    }
}
