use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::time::Duration;

use daybook::cache::has_journaled_today;
use daybook::clock::FixedClock;
use daybook::db;
use daybook::store::{KvStore, MemoryStore, StoreError};

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[tokio::test(start_paused = true)]
async fn read_through_lifecycle_with_ttl_expiry() {
    let pool = setup_pool().await;
    let store = MemoryStore::new();
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 20, 8, 0, 0).unwrap());

    // No entry yet: miss, false, cache populated.
    assert!(!has_journaled_today(&pool, &store, &clock, 42).await.unwrap());

    // An entry appears, but the cached "false" is still served — the durable
    // store is not consulted on a hit.
    db::insert_entry(&pool, 42, clock.0.date_naive(), "cipher")
        .await
        .unwrap();
    assert!(!has_journaled_today(&pool, &store, &clock, 42).await.unwrap());

    // After the 24h TTL the next call re-reads the durable store.
    tokio::time::advance(Duration::from_secs(24 * 60 * 60 + 1)).await;
    assert!(has_journaled_today(&pool, &store, &clock, 42).await.unwrap());

    // Now "true" is cached: removing the entry does not change the answer.
    sqlx::query("DELETE FROM entries")
        .execute(&pool)
        .await
        .unwrap();
    assert!(has_journaled_today(&pool, &store, &clock, 42).await.unwrap());
}

#[tokio::test]
async fn cache_is_scoped_per_owner_and_date() {
    let pool = setup_pool().await;
    let store = MemoryStore::new();
    let today = Utc.with_ymd_and_hms(2024, 3, 20, 8, 0, 0).unwrap();
    let clock = FixedClock(today);

    db::insert_entry(&pool, 1, today.date_naive(), "cipher")
        .await
        .unwrap();

    assert!(has_journaled_today(&pool, &store, &clock, 1).await.unwrap());
    assert!(!has_journaled_today(&pool, &store, &clock, 2).await.unwrap());

    // A new day means a new key: yesterday's cached "true" does not leak.
    let tomorrow = FixedClock(today + ChronoDuration::days(1));
    assert!(!has_journaled_today(&pool, &store, &tomorrow, 1)
        .await
        .unwrap());
}

/// Store that fails every operation, to prove the cache is advisory.
struct DownStore;

#[async_trait]
impl KvStore for DownStore {
    async fn rpush(&self, _queue: &str, _payload: &str) -> Result<(), StoreError> {
        Err(StoreError("down".into()))
    }

    async fn blpop(&self, _queue: &str, _timeout: Duration) -> Result<Option<String>, StoreError> {
        Err(StoreError("down".into()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError("down".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError("down".into()))
    }
}

#[tokio::test]
async fn store_failure_never_changes_the_answer() {
    let pool = setup_pool().await;
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 20, 8, 0, 0).unwrap());

    assert!(!has_journaled_today(&pool, &DownStore, &clock, 9).await.unwrap());

    db::insert_entry(&pool, 9, clock.0.date_naive(), "cipher")
        .await
        .unwrap();
    assert!(has_journaled_today(&pool, &DownStore, &clock, 9).await.unwrap());
}
