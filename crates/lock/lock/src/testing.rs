use std::time::Duration;

use crate::error::LockError;
use crate::store::LockStore;
use crate::ttl::LockTtl;

/// Build a key unique to this conformance run so suites can share a backend.
fn test_key(run: &str, name: &str) -> String {
    format!("conformance:{run}:{name}")
}

/// Run the full lock store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if the store fails an operation. Behavioural mismatches
/// panic with a description of the broken expectation.
pub async fn run_store_conformance_tests(store: &dyn LockStore) -> Result<(), LockError> {
    let run = uuid::Uuid::new_v4().to_string();
    test_set_if_absent_new(store, &run).await?;
    test_set_if_absent_existing(store, &run).await?;
    test_compare_and_delete(store, &run).await?;
    test_compare_and_set_expiry(store, &run).await?;
    test_exists(store, &run).await?;
    test_remaining_ttl(store, &run).await?;
    test_delete(store, &run).await?;
    Ok(())
}

async fn test_set_if_absent_new(store: &dyn LockStore, run: &str) -> Result<(), LockError> {
    let key = test_key(run, "set-new");
    let created = store
        .set_if_absent(&key, "owner-a", Duration::from_secs(10))
        .await?;
    assert!(created, "set_if_absent on a new key should return true");
    store.delete(&key).await?;
    Ok(())
}

async fn test_set_if_absent_existing(store: &dyn LockStore, run: &str) -> Result<(), LockError> {
    let key = test_key(run, "set-existing");
    store
        .set_if_absent(&key, "owner-a", Duration::from_secs(10))
        .await?;
    let created = store
        .set_if_absent(&key, "owner-b", Duration::from_secs(10))
        .await?;
    assert!(
        !created,
        "set_if_absent on an existing key should return false"
    );

    // The original owner must still be in place.
    assert!(
        !store.compare_and_delete(&key, "owner-b").await?,
        "second writer must not own the key"
    );
    assert!(
        store.compare_and_delete(&key, "owner-a").await?,
        "first writer should still own the key"
    );
    Ok(())
}

async fn test_compare_and_delete(store: &dyn LockStore, run: &str) -> Result<(), LockError> {
    let key = test_key(run, "compare-delete");
    assert!(
        !store.compare_and_delete(&key, "owner-a").await?,
        "compare_and_delete on a missing key should return false"
    );

    store
        .set_if_absent(&key, "owner-a", Duration::from_secs(10))
        .await?;
    assert!(
        !store.compare_and_delete(&key, "owner-b").await?,
        "compare_and_delete with the wrong value should return false"
    );
    assert!(
        store.exists(&key).await?,
        "key should survive a mismatched compare_and_delete"
    );
    assert!(store.compare_and_delete(&key, "owner-a").await?);
    assert!(!store.exists(&key).await?, "key should be gone after delete");
    Ok(())
}

async fn test_compare_and_set_expiry(store: &dyn LockStore, run: &str) -> Result<(), LockError> {
    let key = test_key(run, "compare-expire");
    assert!(
        !store
            .compare_and_set_expiry(&key, "owner-a", Duration::from_secs(60))
            .await?,
        "compare_and_set_expiry on a missing key should return false"
    );

    store
        .set_if_absent(&key, "owner-a", Duration::from_secs(5))
        .await?;

    assert!(
        !store
            .compare_and_set_expiry(&key, "owner-b", Duration::from_secs(600))
            .await?,
        "compare_and_set_expiry with the wrong value should return false"
    );
    let ttl = store.remaining_ttl(&key).await?;
    assert!(
        ttl.remaining().is_some_and(|d| d <= Duration::from_secs(5)),
        "mismatched extend must not change the TTL, got {ttl:?}"
    );

    assert!(
        store
            .compare_and_set_expiry(&key, "owner-a", Duration::from_secs(600))
            .await?
    );
    let ttl = store.remaining_ttl(&key).await?;
    assert!(
        ttl.remaining().is_some_and(|d| d > Duration::from_secs(5)),
        "extend should reset the TTL, got {ttl:?}"
    );

    store.delete(&key).await?;
    Ok(())
}

async fn test_exists(store: &dyn LockStore, run: &str) -> Result<(), LockError> {
    let key = test_key(run, "exists");
    assert!(!store.exists(&key).await?);
    store
        .set_if_absent(&key, "owner-a", Duration::from_secs(10))
        .await?;
    assert!(store.exists(&key).await?);
    store.delete(&key).await?;
    Ok(())
}

async fn test_remaining_ttl(store: &dyn LockStore, run: &str) -> Result<(), LockError> {
    let key = test_key(run, "ttl");
    assert_eq!(
        store.remaining_ttl(&key).await?,
        LockTtl::Missing,
        "missing key should report the missing sentinel"
    );

    store
        .set_if_absent(&key, "owner-a", Duration::from_secs(10))
        .await?;
    let ttl = store.remaining_ttl(&key).await?;
    assert!(
        ttl.remaining().is_some_and(|d| d <= Duration::from_secs(10)),
        "TTL should not exceed the lease, got {ttl:?}"
    );
    store.delete(&key).await?;
    Ok(())
}

async fn test_delete(store: &dyn LockStore, run: &str) -> Result<(), LockError> {
    let key = test_key(run, "delete");
    store
        .set_if_absent(&key, "owner-a", Duration::from_secs(10))
        .await?;
    assert!(
        store.delete(&key).await?,
        "delete should return true for an existing key"
    );
    assert!(
        !store.delete(&key).await?,
        "delete on a missing key should return false"
    );
    Ok(())
}
