// tests/redis_store_tests.rs
//
// Runs against a live Redis named by TEST_REDIS_URL, e.g.
// `TEST_REDIS_URL=redis://localhost:6379/15 cargo test --test redis_store_tests`.
// Every test uses its own key prefix and cleans up after itself.

#![cfg(feature = "redis")]

mod common;

use common::{new_key, test_policy, SEC, TTL_MS};
use deadpool_redis::{Config as PoolConfig, Pool, PoolConfig as PoolSize, Runtime};
use key_registry::{
    error::AppError,
    registry::ChangeSet,
    service::now_millis,
    storage::{RedisStore, RegistryStore, REGISTRY_NAMESPACE},
};
use std::sync::Arc;

fn test_redis_url() -> Option<String> {
    let url = std::env::var("TEST_REDIS_URL").ok();
    if url.is_none() {
        println!("TEST_REDIS_URL not set, skipping Redis store test");
    }
    url
}

fn pool(url: &str, max_size: usize) -> Pool {
    let mut config = PoolConfig::from_url(url);
    config.pool = Some(PoolSize::new(max_size));
    config.create_pool(Some(Runtime::Tokio1)).unwrap()
}

fn unique_prefix() -> String {
    format!("key_registry_test:{}:", uuid::Uuid::new_v4())
}

async fn cleanup(store: &RedisStore) {
    let mut cursor = 0;
    loop {
        let batch = store.purge_by_prefix("", cursor, 100).await.unwrap();
        if batch.is_complete() {
            break;
        }
        cursor = batch.next_cursor;
    }
}

async fn raw_set(pool: &Pool, key: &str, value: &str) {
    let mut conn = pool.get().await.unwrap();
    let _: () = redis::cmd("SET")
        .arg(key)
        .arg(value)
        .query_async(&mut conn)
        .await
        .unwrap();
}

async fn raw_get(pool: &Pool, key: &str) -> Option<String> {
    let mut conn = pool.get().await.unwrap();
    redis::cmd("GET").arg(key).query_async(&mut conn).await.unwrap()
}

#[tokio::test]
async fn test_concurrent_outcomes_are_never_lost() {
    let Some(url) = test_redis_url() else { return };
    let prefix = unique_prefix();
    let store = Arc::new(RedisStore::new(pool(&url, 16), prefix.as_str(), 64));

    store
        .apply(
            "tenant-a",
            &ChangeSet::new().add(new_key("k1")),
            SEC,
            &test_policy(),
        )
        .await
        .unwrap();

    let tasks: Vec<_> = (0..40u64)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .apply(
                        "tenant-a",
                        &ChangeSet::new().record_success("k1", i),
                        2 * SEC,
                        &test_policy(),
                    )
                    .await
            })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let registry = store.read("tenant-a").await.unwrap().unwrap();
    assert_eq!(registry.states[0].current_window.successes, 40);
    assert_eq!(registry.states[0].current_window.latency_spike, 39);

    cleanup(&store).await;
}

#[tokio::test]
async fn test_contention_failures_leave_no_partial_writes() {
    let Some(url) = test_redis_url() else { return };
    let prefix = unique_prefix();
    // One attempt only, so losing a race surfaces as StoreContention.
    let store = Arc::new(RedisStore::new(pool(&url, 16), prefix.as_str(), 1));

    store
        .apply(
            "tenant-a",
            &ChangeSet::new().add(new_key("k1")),
            SEC,
            &test_policy(),
        )
        .await
        .unwrap();

    let tasks: Vec<_> = (0..30u64)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .apply(
                        "tenant-a",
                        &ChangeSet::new().record_failure("k1"),
                        2 * SEC,
                        &test_policy(),
                    )
                    .await
            })
        })
        .collect();

    let mut committed = 0;
    for result in futures::future::join_all(tasks).await {
        match result.unwrap() {
            Ok(_) => committed += 1,
            Err(AppError::StoreContention { attempts, .. }) => assert_eq!(attempts, 1),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let registry = store.read("tenant-a").await.unwrap().unwrap();
    assert!(committed >= 1);
    assert_eq!(registry.states[0].current_window.failures, committed);

    cleanup(&store).await;
}

#[tokio::test]
async fn test_corrupt_document_is_left_untouched() {
    let Some(url) = test_redis_url() else { return };
    let prefix = unique_prefix();
    // A single pooled connection: a WATCH left behind by the failed apply
    // would abort the next transaction on it.
    let pool = pool(&url, 1);
    let store = RedisStore::new(pool.clone(), prefix.as_str(), 1);

    let key = format!("{prefix}{REGISTRY_NAMESPACE}tenant-a");
    let corrupt = r#"{"states":[],"expires_at":1,"unexpected":true}"#;
    raw_set(&pool, &key, corrupt).await;

    let result = store
        .apply(
            "tenant-a",
            &ChangeSet::new().add(new_key("k1")),
            SEC,
            &test_policy(),
        )
        .await;
    assert!(matches!(result, Err(AppError::CorruptRegistry { .. })));
    assert!(matches!(
        store.read("tenant-a").await,
        Err(AppError::CorruptRegistry { .. })
    ));
    assert_eq!(raw_get(&pool, &key).await.as_deref(), Some(corrupt));

    // Touch the watched key, then write elsewhere on the same connection.
    raw_set(&pool, &key, corrupt).await;
    store
        .apply(
            "tenant-b",
            &ChangeSet::new().add(new_key("k1")),
            SEC,
            &test_policy(),
        )
        .await
        .unwrap();

    cleanup(&store).await;
}

#[tokio::test]
async fn test_native_expiry_tracks_document_expiry() {
    let Some(url) = test_redis_url() else { return };
    let prefix = unique_prefix();
    let pool = pool(&url, 4);
    let store = RedisStore::new(pool.clone(), prefix.as_str(), 4);

    let now = now_millis();
    let registry = store
        .apply(
            "tenant-a",
            &ChangeSet::new().add(new_key("k1")),
            now,
            &test_policy(),
        )
        .await
        .unwrap();
    assert_eq!(registry.expires_at, now + TTL_MS);

    let mut conn = pool.get().await.unwrap();
    let pttl: i64 = redis::cmd("PTTL")
        .arg(format!("{prefix}{REGISTRY_NAMESPACE}tenant-a"))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(pttl > 0, "key has no expiry: {pttl}");
    assert!(pttl <= TTL_MS as i64);
    assert!(pttl > (TTL_MS - 60 * SEC) as i64);
    drop(conn);

    cleanup(&store).await;
}

#[tokio::test]
async fn test_purge_by_prefix_pages_until_complete() {
    let Some(url) = test_redis_url() else { return };
    let prefix = unique_prefix();
    let store = RedisStore::new(pool(&url, 4), prefix.as_str(), 4);

    for i in 0..7 {
        store
            .apply(
                &format!("openai:{i}"),
                &ChangeSet::new().add(new_key("k1")),
                now_millis(),
                &test_policy(),
            )
            .await
            .unwrap();
    }
    for id in ["anthropic:0", "open:0"] {
        store
            .apply(
                id,
                &ChangeSet::new().add(new_key("k1")),
                now_millis(),
                &test_policy(),
            )
            .await
            .unwrap();
    }

    let mut cursor = 0;
    let mut deleted = 0;
    let mut rounds = 0;
    loop {
        let batch = store.purge_by_prefix("openai:", cursor, 2).await.unwrap();
        deleted += batch.deleted;
        rounds += 1;
        assert!(rounds < 10_000, "purge cursor never completed");
        if batch.is_complete() {
            break;
        }
        cursor = batch.next_cursor;
    }

    assert_eq!(deleted, 7);
    for i in 0..7 {
        assert!(store.read(&format!("openai:{i}")).await.unwrap().is_none());
    }
    assert!(store.read("anthropic:0").await.unwrap().is_some());
    assert!(store.read("open:0").await.unwrap().is_some());

    cleanup(&store).await;
}
