//! The shared summary-task FIFO.
//!
//! A thin typed facade over the key-value store's list primitives: one named
//! queue, JSON payloads. Delivery is exactly-once per element at this level
//! (the store's pop is atomic); redelivery only happens when the worker
//! requeues a failed batch.

use crate::model::SummaryTask;
use crate::store::{KvStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Name of the list the producer and worker communicate over.
pub const SUMMARY_QUEUE: &str = "summary_tasks";

#[derive(Debug, Error)]
pub enum QueueError {
    /// Push/pop transport failure. Reported to the caller, never retried
    /// here.
    #[error("queue I/O failure: {0}")]
    Io(#[from] StoreError),
    /// A dequeued payload that does not parse as a task. The caller discards
    /// it and keeps going.
    #[error("malformed task payload: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct TaskQueue {
    store: Arc<dyn KvStore>,
    name: &'static str,
}

impl TaskQueue {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            name: SUMMARY_QUEUE,
        }
    }

    /// Serialize and append a task to the tail.
    pub async fn push(&self, task: &SummaryTask) -> Result<(), QueueError> {
        let payload = serde_json::to_string(task)?;
        self.store.rpush(self.name, &payload).await?;
        Ok(())
    }

    /// Remove and return the head task, waiting up to `timeout`. `Ok(None)`
    /// means the queue was observed empty; it is not an error.
    pub async fn pop_blocking(&self, timeout: Duration) -> Result<Option<SummaryTask>, QueueError> {
        match self.store.blpop(self.name, timeout).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn queue_over_memory() -> (TaskQueue, MemoryStore) {
        let store = MemoryStore::new();
        (TaskQueue::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn push_pop_round_trip_preserves_order() {
        let (queue, _) = queue_over_memory();
        let first = SummaryTask {
            owner_id: 1,
            entries: vec!["a".into()],
        };
        let second = SummaryTask {
            owner_id: 2,
            entries: vec!["b".into(), "c".into()],
        };
        queue.push(&first).await.unwrap();
        queue.push(&second).await.unwrap();

        let popped = queue
            .pop_blocking(Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped, first);
        let popped = queue
            .pop_blocking(Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped, second);
    }

    #[tokio::test]
    async fn empty_queue_pops_none() {
        let (queue, _) = queue_over_memory();
        let popped = queue.pop_blocking(Duration::from_millis(10)).await.unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_serde_error() {
        let (queue, store) = queue_over_memory();
        store.rpush(SUMMARY_QUEUE, "{not json").await.unwrap();
        let err = queue
            .pop_blocking(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Serde(_)));
        // The bad payload is consumed, not left at the head.
        let popped = queue.pop_blocking(Duration::from_millis(10)).await.unwrap();
        assert_eq!(popped, None);
    }
}
