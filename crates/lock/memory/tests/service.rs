//! End-to-end behaviour of the lock service over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use warden_lock::{
    DistributedLockService, LockConfig, LockError, LockSpec, LockStore, LockToken, LockTtl,
    RetryPolicy, locked, locked_with,
};
use warden_lock_memory::MemoryLockStore;

fn service() -> DistributedLockService {
    DistributedLockService::new(Arc::new(MemoryLockStore::new()))
}

const LEASE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn concurrent_try_acquire_has_one_winner() {
    let svc = service();

    let attempts = (0..8).map(|_| svc.try_acquire("resource:123", LEASE));
    let results = futures::future::join_all(attempts).await;

    let winners = results
        .into_iter()
        .map(|r| r.expect("memory store should not fail"))
        .filter(Option::is_some)
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn release_with_foreign_token_keeps_record() {
    let svc = service();
    let _holder = svc.acquire("resource:123", LEASE).await.unwrap();

    let released = svc
        .release("resource:123", &LockToken::from("someone-else"))
        .await;

    assert!(!released);
    assert!(svc.is_locked("resource:123").await.unwrap());
}

#[tokio::test]
async fn acquire_then_release_unlocks() {
    let svc = service();
    let token = svc.acquire("resource:123", LEASE).await.unwrap();

    assert!(svc.is_locked("resource:123").await.unwrap());
    assert!(svc.release("resource:123", &token).await);
    assert!(!svc.is_locked("resource:123").await.unwrap());
    assert!(
        !svc.release("resource:123", &token).await,
        "second release should report nothing to release"
    );
}

#[tokio::test(start_paused = true)]
async fn lease_expires_without_release() {
    let svc = service();
    let stale = svc
        .acquire("resource:123", Duration::from_millis(500))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_millis(501)).await;

    assert!(!svc.is_locked("resource:123").await.unwrap());
    assert_eq!(svc.lock_ttl("resource:123").await.unwrap(), LockTtl::Missing);
    let fresh = svc.acquire("resource:123", LEASE).await.unwrap();

    assert!(
        !svc.release("resource:123", &stale).await,
        "expired holder must not release the new holder's lock"
    );
    assert!(svc.release("resource:123", &fresh).await);
}

#[tokio::test(start_paused = true)]
async fn acquire_waits_for_lease_expiry() {
    let svc = service();
    svc.acquire("resource:123", Duration::from_millis(150))
        .await
        .unwrap();

    let token = svc
        .acquire_with(
            "resource:123",
            LEASE,
            RetryPolicy::new(5, Duration::from_millis(100)),
        )
        .await;

    assert!(token.is_ok(), "retry loop should outlast the first lease");
}

#[derive(Debug)]
enum JobError {
    Lock(LockError),
    Failed,
}

impl From<LockError> for JobError {
    fn from(e: LockError) -> Self {
        Self::Lock(e)
    }
}

#[tokio::test]
async fn with_lock_releases_when_op_fails() {
    let svc = service();

    let result: Result<(), JobError> = svc
        .with_lock("resource:123", LEASE, || async { Err(JobError::Failed) })
        .await;

    assert!(matches!(result, Err(JobError::Failed)));
    assert!(!svc.is_locked("resource:123").await.unwrap());
}

#[tokio::test]
async fn with_lock_holds_lock_during_op() {
    let svc = service();

    let seen = svc
        .with_lock("resource:123", LEASE, || async {
            svc.is_locked("resource:123").await
        })
        .await
        .unwrap();

    assert!(seen);
    assert!(!svc.is_locked("resource:123").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn with_lock_reports_busy_resource() {
    let svc = service();
    let _holder = svc.acquire("resource:123", Duration::from_secs(60)).await.unwrap();

    let result: Result<(), JobError> = svc
        .with_lock_retry(
            "resource:123",
            LEASE,
            RetryPolicy::new(2, Duration::from_millis(10)),
            || async { Ok(()) },
        )
        .await;

    match result {
        Err(JobError::Lock(e)) => assert!(e.is_busy()),
        other => panic!("expected busy error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn extend_with_wrong_token_leaves_ttl() {
    let svc = service();
    let token = svc.acquire("resource:123", LEASE).await.unwrap();

    assert!(
        !svc.extend_lock("resource:123", &LockToken::from("wrong"), Duration::from_secs(60))
            .await
    );
    assert_eq!(
        svc.lock_ttl("resource:123").await.unwrap(),
        LockTtl::Remaining(LEASE)
    );

    assert!(
        svc.extend_lock("resource:123", &token, Duration::from_secs(60))
            .await
    );
    assert_eq!(
        svc.lock_ttl("resource:123").await.unwrap(),
        LockTtl::Remaining(Duration::from_secs(60))
    );
}

#[tokio::test(start_paused = true)]
async fn extend_keeps_long_running_holder_alive() {
    let svc = service();
    let token = svc.acquire("resource:123", Duration::from_secs(2)).await.unwrap();

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(svc.extend_lock("resource:123", &token, Duration::from_secs(2)).await);
    }

    assert!(svc.try_acquire("resource:123", LEASE).await.unwrap().is_none());
}

#[tokio::test]
async fn unbounded_lease_is_accepted() {
    let svc = service();
    let token = svc.acquire("order:42", Duration::MAX).await.unwrap();

    assert!(svc.extend_lock("order:42", &token, Duration::MAX).await);
    assert!(svc.is_locked("order:42").await.unwrap());
    assert!(svc.release("order:42", &token).await);
}

#[tokio::test]
async fn force_release_clears_any_holder() {
    let svc = service();
    let token = svc.acquire("resource:123", LEASE).await.unwrap();

    assert!(svc.force_release_lock("resource:123").await);
    assert!(!svc.is_locked("resource:123").await.unwrap());
    assert!(!svc.force_release_lock("resource:123").await);
    assert!(!svc.release("resource:123", &token).await);
}

#[tokio::test]
async fn prefix_isolates_keyspace() {
    let store = Arc::new(MemoryLockStore::new());
    let svc = DistributedLockService::with_config(
        Arc::clone(&store) as Arc<dyn LockStore>,
        LockConfig::default(),
    );

    svc.acquire("order:42", LEASE).await.unwrap();

    assert!(store.exists("lock:order:42").await.unwrap());
    assert!(!store.exists("order:42").await.unwrap());
}

#[tokio::test]
async fn two_callers_race_on_order() {
    let svc = service();
    let ttl = Duration::from_millis(5000);

    let (x, y) = tokio::join!(svc.try_acquire("order:42", ttl), svc.try_acquire("order:42", ttl));
    let (x, y) = (x.unwrap(), y.unwrap());
    let winner = match (x, y) {
        (Some(t), None) | (None, Some(t)) => t,
        other => panic!("exactly one caller should win, got {other:?}"),
    };

    assert!(svc.release("order:42", &winner).await);
    let retry = svc.try_acquire("order:42", ttl).await.unwrap();
    assert!(retry.is_some(), "loser should acquire after release");
}

#[tokio::test]
async fn contended_with_lock_serialises_critical_sections() {
    let svc = Arc::new(service());
    let inside = Arc::new(AtomicU32::new(0));
    let completed = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let svc = Arc::clone(&svc);
        let inside = Arc::clone(&inside);
        let completed = Arc::clone(&completed);
        handles.push(tokio::spawn(async move {
            svc.with_lock_retry(
                "contention",
                Duration::from_secs(5),
                RetryPolicy::new(500, Duration::from_millis(2)),
                || async {
                    let concurrent = inside.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(concurrent, 0, "critical sections overlapped");
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), LockError>(())
                },
            )
            .await
            .expect("should eventually acquire");
        }));
    }

    for h in handles {
        h.await.expect("task should not panic");
    }
    assert_eq!(completed.load(Ordering::SeqCst), 8);
}

struct DeviceService {
    locks: Option<Arc<DistributedLockService>>,
}

impl warden_lock::LockProvider for DeviceService {
    fn lock_service(&self) -> Option<&DistributedLockService> {
        self.locks.as_deref()
    }
}

#[tokio::test]
async fn locked_operation_resolves_key_from_args() {
    let svc = Arc::new(service());
    let devices = DeviceService {
        locks: Some(Arc::clone(&svc)),
    };
    let observer = Arc::clone(&svc);

    let provision = locked(
        LockSpec::new("device:{0}:provision", LEASE).unwrap(),
        move |(device_id,): (u64,)| {
            let observer = Arc::clone(&observer);
            async move {
                let held = observer.is_locked(&format!("device:{device_id}:provision")).await?;
                Ok::<bool, LockError>(held)
            }
        },
    );

    assert!(provision.call(&devices, (456_u64,)).await.unwrap());
    assert!(!svc.is_locked("device:456:provision").await.unwrap());
}

#[tokio::test]
async fn locked_operation_without_service_fails_fast() {
    let devices = DeviceService { locks: None };
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let op = locked(
        LockSpec::new("device:{0}:provision", LEASE).unwrap(),
        move |_: (u64,)| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), LockError>(()) }
        },
    );

    let err = op.call(&devices, (456_u64,)).await.unwrap_err();
    assert!(matches!(err, LockError::Configuration(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn locked_operation_with_per_call_spec() {
    let svc = service();
    let _holder = svc.acquire("user:123:login", Duration::from_secs(60)).await.unwrap();

    let login = locked_with(
        |args: &[String]| {
            let lease = if args.get(1).is_some_and(|m| m == "sso") {
                Duration::from_secs(30)
            } else {
                Duration::from_secs(5)
            };
            Ok(LockSpec::new("user:{0}:login", lease)?.with_retry(RetryPolicy::none()))
        },
        |(_user, _method): (u32, String)| async { Ok::<(), LockError>(()) },
    );

    let err = login.call(&svc, (123_u32, "sso".to_owned())).await.unwrap_err();
    assert!(err.is_busy());

    login.call(&svc, (7_u32, "password".to_owned())).await.unwrap();
    assert!(!svc.is_locked("user:7:login").await.unwrap());
}
