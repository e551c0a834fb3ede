//! Key-value store port backing the task queue, the batch manifests, and the
//! journal-today cache.
//!
//! `RedisStore` is the production backend. `MemoryStore` is an in-process
//! implementation with the same blocking-pop and TTL semantics, used by
//! tests and local development.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use bb8_redis::bb8::Pool;
use bb8_redis::redis::AsyncCommands;
use bb8_redis::RedisConnectionManager;

/// Transport-level store failure. Callers decide the disposition: the
/// producer drops the affected task, the worker ends its drain, the cache
/// treats it as a miss.
#[derive(Debug, Error)]
#[error("store I/O error: {0}")]
pub struct StoreError(pub String);

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Append a payload to the tail of the named list.
    async fn rpush(&self, queue: &str, payload: &str) -> Result<(), StoreError>;

    /// Atomically remove and return the head of the named list, waiting up
    /// to `timeout`. `Ok(None)` means the list stayed empty.
    async fn blpop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, StoreError>;

    /// Set a value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Redis-backed store over a bb8 connection pool.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool<RedisConnectionManager>,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let manager =
            RedisConnectionManager::new(url).map_err(|err| StoreError(err.to_string()))?;
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|err| StoreError(err.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn rpush(&self, queue: &str, payload: &str) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| StoreError(err.to_string()))?;
        conn.rpush::<_, _, ()>(queue, payload)
            .await
            .map_err(|err| StoreError(err.to_string()))?;
        Ok(())
    }

    async fn blpop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, StoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| StoreError(err.to_string()))?;
        let popped: Option<(String, String)> = conn
            .blpop(queue, timeout.as_secs_f64())
            .await
            .map_err(|err| StoreError(err.to_string()))?;
        Ok(popped.map(|(_, payload)| payload))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| StoreError(err.to_string()))?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|err| StoreError(err.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| StoreError(err.to_string()))?;
        conn.get(key)
            .await
            .map_err(|err| StoreError(err.to_string()))
    }
}

#[derive(Default)]
struct MemoryInner {
    queues: HashMap<String, VecDeque<String>>,
    values: HashMap<String, (String, Instant)>,
}

/// In-process store with real blocking-pop and TTL behavior. TTLs run on
/// tokio's clock so paused-time tests can expire entries deterministically.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    pushed: Arc<Notify>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn rpush(&self, queue: &str, payload: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_string());
        drop(inner);
        self.pushed.notify_one();
        Ok(())
    }

    async fn blpop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(payload) = self
                .inner
                .lock()
                .await
                .queues
                .get_mut(queue)
                .and_then(VecDeque::pop_front)
            {
                return Ok(Some(payload));
            }
            if tokio::time::timeout_at(deadline, self.pushed.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .values
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        let expired = matches!(inner.values.get(key), Some((_, expiry)) if *expiry <= Instant::now());
        if expired {
            inner.values.remove(key);
            return Ok(None);
        }
        Ok(inner.values.get(key).map(|(value, _)| value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_queue_is_fifo() {
        let store = MemoryStore::new();
        store.rpush("q", "one").await.unwrap();
        store.rpush("q", "two").await.unwrap();
        let first = store.blpop("q", Duration::from_millis(10)).await.unwrap();
        let second = store.blpop("q", Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.as_deref(), Some("one"));
        assert_eq!(second.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn memory_blpop_times_out_empty() {
        let store = MemoryStore::new();
        let popped = store.blpop("q", Duration::from_millis(10)).await.unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn memory_blpop_wakes_on_push() {
        let store = MemoryStore::new();
        let pusher = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            pusher.rpush("q", "late").await.unwrap();
        });
        let popped = store.blpop("q", Duration::from_secs(5)).await.unwrap();
        assert_eq!(popped.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn memory_delivers_each_element_to_one_consumer() {
        let store = MemoryStore::new();
        for i in 0..8 {
            store.rpush("q", &format!("task-{i}")).await.unwrap();
        }
        let mut handles = Vec::new();
        for _ in 0..4 {
            let consumer = store.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(payload) =
                    consumer.blpop("q", Duration::from_millis(20)).await.unwrap()
                {
                    seen.push(payload);
                }
                seen
            }));
        }
        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        let expected: Vec<String> = (0..8).map(|i| format!("task-{i}")).collect();
        assert_eq!(all, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_values_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }
}
