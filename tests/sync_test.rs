mod common;

use std::time::Duration;

use common::*;
use tempfile::TempDir;
use workspace_resolver::errors::ResolverError;
use workspace_resolver::remote::RemoteError;
use workspace_resolver::sync::SyncOrchestrator;
use workspace_resolver::types::*;

async fn run_sync(
    dir: &TempDir,
    directory: &MockDirectory,
    concurrency: usize,
) -> workspace_resolver::errors::Result<SyncOutcome> {
    let config = test_config(dir);
    let (store, lock) = store_and_lock(&config);
    SyncOrchestrator::new(&store, &lock, directory, concurrency)
        .run()
        .await
}

fn completed(outcome: SyncOutcome) -> SyncStats {
    match outcome {
        SyncOutcome::Completed(stats) => stats,
        other => panic!("expected a completed sync, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sync_follows_pagination() {
    let dir = TempDir::new().unwrap();
    let (a, b, c) = (hex_id(1), hex_id(2), hex_id(3));
    let mock = MockDirectory::new()
        .with_page(&[(&a, "Tasks Database"), (&b, "Projects")])
        .with_page(&[(&c, "Meeting Notes")]);

    let stats = completed(run_sync(&dir, &mock, 3).await.unwrap());
    assert_eq!(stats.pages, 2);
    assert_eq!(stats.listed, 3);
    assert_eq!(stats.cached, 3);
    assert!(!stats.is_partial());
    assert_eq!(mock.list_calls(), 2);

    let config = test_config(&dir);
    let (store, lock) = store_and_lock(&config);
    let cache = store.load().await.unwrap();
    let ids: Vec<&str> = cache.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![a.as_str(), b.as_str(), c.as_str()]);
    assert!(cache.last_sync.is_some());
    assert!(cache.sync_errors.is_empty());

    let tasks = cache.get(&a).unwrap();
    assert!(tasks.has_alias("td"));
    assert_eq!(tasks.property_summary.get("Name").map(String::as_str), Some("title"));
    assert!(tasks.url.is_some());

    assert!(!lock.path().exists(), "lock must be released after sync");
}

#[tokio::test]
async fn test_sync_dedupes_ids_across_pages() {
    let dir = TempDir::new().unwrap();
    let a = hex_id(1);
    let mock = MockDirectory::new()
        .with_page(&[(&a, "Tasks")])
        .with_page(&[(&a, "Tasks")]);

    let stats = completed(run_sync(&dir, &mock, 3).await.unwrap());
    assert_eq!(stats.listed, 1);
    assert_eq!(mock.detail_calls(), 1);
}

#[tokio::test]
async fn test_sync_bounds_detail_concurrency() {
    let dir = TempDir::new().unwrap();
    let ids: Vec<String> = (1..=9).map(hex_id).collect();
    let objects: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "Object")).collect();
    let mock = MockDirectory::new()
        .with_page(&objects[..])
        .with_detail_delay(Duration::from_millis(20));

    let stats = completed(run_sync(&dir, &mock, 3).await.unwrap());
    assert_eq!(stats.cached, 9);
    let peak = mock.max_in_flight.load(std::sync::atomic::Ordering::SeqCst);
    assert!(peak <= 3, "at most 3 detail requests may overlap, saw {peak}");
    assert!(peak > 1, "detail requests should overlap, saw {peak}");
}

#[tokio::test]
async fn test_detail_failures_are_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    let (a, b, c) = (hex_id(1), hex_id(2), hex_id(3));
    let mock = MockDirectory::new()
        .with_page(&[(&a, "Tasks"), (&b, "Broken"), (&c, "Notes")])
        .with_detail_error(&b, RemoteError::PermissionDenied("restricted".to_string()));

    let stats = completed(run_sync(&dir, &mock, 2).await.unwrap());
    assert_eq!(stats.cached, 2);
    assert_eq!(stats.failed, 1);
    assert!(stats.is_partial());

    let config = test_config(&dir);
    let (store, _) = store_and_lock(&config);
    let cache = store.load().await.unwrap();
    assert_eq!(cache.entries.len(), 2);
    assert!(cache.get(&b).is_none());
    assert_eq!(cache.sync_errors.len(), 1);
    assert!(cache.sync_errors[0].message.contains("Broken"));
}

#[tokio::test]
async fn test_listing_failure_on_first_page_keeps_previous_cache() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (store, lock) = store_and_lock(&config);
    seed_cache(
        &store,
        vec![CacheEntry::new(hex_id(7), ObjectKind::Database, "Old Tasks")],
    )
    .await;
    let before = store.load().await.unwrap();

    let mock = MockDirectory::new()
        .with_page(&[(&hex_id(1), "Tasks")])
        .failing_listing_at(0);

    let err = run_sync(&dir, &mock, 3).await.unwrap_err();
    assert!(matches!(err, ResolverError::Remote(RemoteError::Transient(_))));
    assert_eq!(store.load().await.unwrap(), before);
    assert!(!lock.path().exists());
}

#[tokio::test]
async fn test_listing_failure_on_later_page_persists_partial_result() {
    let dir = TempDir::new().unwrap();
    let (a, b) = (hex_id(1), hex_id(2));
    let mock = MockDirectory::new()
        .with_page(&[(&a, "Tasks")])
        .with_page(&[(&b, "Projects")])
        .failing_listing_at(1);

    let stats = completed(run_sync(&dir, &mock, 3).await.unwrap());
    assert!(stats.listing_truncated);
    assert!(stats.is_partial());
    assert_eq!(stats.pages, 1);
    assert_eq!(stats.cached, 1);

    let config = test_config(&dir);
    let (store, _) = store_and_lock(&config);
    let cache = store.load().await.unwrap();
    assert!(cache.get(&a).is_some());
    assert!(cache.get(&b).is_none());
    assert_eq!(cache.sync_errors.len(), 1);
}

#[tokio::test]
async fn test_all_detail_failures_keep_previous_entries() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (store, _) = store_and_lock(&config);
    seed_cache(
        &store,
        vec![CacheEntry::new(hex_id(7), ObjectKind::Database, "Old Tasks")],
    )
    .await;
    let previous_sync = store.load().await.unwrap().last_sync;

    let a = hex_id(1);
    let mock = MockDirectory::new()
        .with_page(&[(&a, "Tasks")])
        .with_detail_error(&a, RemoteError::Transient("timeout".to_string()));

    let stats = completed(run_sync(&dir, &mock, 3).await.unwrap());
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.cached, 0);

    let cache = store.load().await.unwrap();
    assert!(cache.get(&hex_id(7)).is_some());
    assert_eq!(cache.last_sync, previous_sync);
    assert_eq!(cache.sync_errors.len(), 1);
}

#[tokio::test]
async fn test_empty_listing_clears_entries() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (store, _) = store_and_lock(&config);
    seed_cache(
        &store,
        vec![CacheEntry::new(hex_id(7), ObjectKind::Database, "Deleted Remotely")],
    )
    .await;

    let mock = MockDirectory::new().with_empty_page();
    let stats = completed(run_sync(&dir, &mock, 3).await.unwrap());
    assert_eq!(stats.cached, 0);
    assert!(store.load().await.unwrap().entries.is_empty());
}

#[tokio::test]
async fn test_held_lock_skips_sync() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (_, lock) = store_and_lock(&config);
    assert!(lock.acquire().await.unwrap());

    let mock = MockDirectory::new().with_page(&[(&hex_id(1), "Tasks")]);
    let outcome = run_sync(&dir, &mock, 3).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::LockHeld));
    assert_eq!(mock.list_calls(), 0);
    assert!(lock.path().exists(), "the other holder's lock stays in place");
}

#[tokio::test]
async fn test_archived_flag_is_carried_into_cache() {
    let dir = TempDir::new().unwrap();
    let a = hex_id(1);
    let mock = MockDirectory::new()
        .with_page(&[(&a, "Old Roadmap")])
        .with_archived(&a);

    completed(run_sync(&dir, &mock, 3).await.unwrap());
    let config = test_config(&dir);
    let (store, _) = store_and_lock(&config);
    assert!(store.load().await.unwrap().get(&a).unwrap().archived);
}

#[tokio::test]
async fn test_listed_ids_are_stored_canonical() {
    let dir = TempDir::new().unwrap();
    let mock = MockDirectory::new().with_page(&[("1FB79D4C-71BB-8032-B722-C82305B63A00", "Tasks")]);

    completed(run_sync(&dir, &mock, 3).await.unwrap());
    let config = test_config(&dir);
    let (store, _) = store_and_lock(&config);
    let cache = store.load().await.unwrap();
    let ids: Vec<&str> = cache.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["1fb79d4c71bb8032b722c82305b63a00"]);
}
