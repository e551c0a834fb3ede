//! The summary worker: a long-running loop that drains the task queue in
//! bounded batches, dispatches merged batches to the summarizer, and
//! persists encrypted results.
//!
//! No failure inside a cycle terminates the loop. Dispatch failures requeue
//! the whole drained batch (at-least-once delivery); encryption and
//! persistence failures skip the affected owner and keep going.

use crate::clock::Clock;
use crate::crypto::Codec;
use crate::db;
use crate::model::{previous_iso_week, SummaryTask};
use crate::queue::{QueueError, TaskQueue};
use crate::summarizer::SummarizerService;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Most tasks drained into one batch.
    pub batch_size: usize,
    /// How long one pop waits before the queue counts as drained.
    pub drain_timeout: Duration,
    /// Sleep between cycles when the queue was empty.
    pub idle_sleep: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            drain_timeout: Duration::from_secs(1),
            idle_sleep: Duration::from_secs(5),
        }
    }
}

impl WorkerSettings {
    pub fn from_config(app: &crate::config::App) -> Self {
        Self {
            batch_size: app.batch_size,
            drain_timeout: Duration::from_millis(app.drain_timeout_ms),
            idle_sleep: Duration::from_millis(app.idle_sleep_ms),
        }
    }
}

/// What one cycle did, mostly for tests and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was on the queue.
    Idle,
    /// A batch of this many tasks was dispatched and persisted.
    Processed(usize),
    /// Dispatch failed; this many tasks went back onto the queue.
    Requeued(usize),
}

pub struct Worker {
    pool: SqlitePool,
    codec: Arc<Codec>,
    queue: TaskQueue,
    summarizer: Arc<dyn SummarizerService>,
    clock: Arc<dyn Clock>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        pool: SqlitePool,
        codec: Arc<Codec>,
        queue: TaskQueue,
        summarizer: Arc<dyn SummarizerService>,
        clock: Arc<dyn Clock>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            pool,
            codec,
            queue,
            summarizer,
            clock,
            settings,
        }
    }

    /// Run cycles until `shutdown` flips to true. The flag is checked once
    /// per iteration, so an in-flight cycle always completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("summary worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let CycleOutcome::Idle = self.run_cycle().await {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.idle_sleep) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
        info!("summary worker stopped");
    }

    /// One drain/merge/dispatch/persist pass. Never returns an error: every
    /// failure path logs and leaves the loop able to continue.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let batch = self.drain().await;
        if batch.is_empty() {
            return CycleOutcome::Idle;
        }

        let merged = merge_batch(&batch);
        let summaries = match self.summarizer.summarize(&merged).await {
            Ok(summaries) => summaries,
            Err(err) => {
                warn!(?err, tasks = batch.len(), "summarizer dispatch failed; requeueing batch");
                let requeued = self.requeue(batch).await;
                return CycleOutcome::Requeued(requeued);
            }
        };

        // The week bucket is derived at persistence time, not from the
        // window the tasks were produced for.
        let (year, week) = previous_iso_week(self.clock.now_utc());
        let mut persisted = 0usize;
        for (owner_id, summary) in &summaries {
            let encrypted = match self.codec.encrypt(summary) {
                Ok(encrypted) => encrypted,
                Err(err) => {
                    warn!(?err, owner_id, "failed to encrypt summary; skipping owner");
                    continue;
                }
            };
            if let Err(err) =
                db::upsert_summary(&self.pool, *owner_id, week, year, &encrypted).await
            {
                warn!(?err, owner_id, "failed to persist summary; skipping owner");
                continue;
            }
            persisted += 1;
        }

        info!(
            tasks = batch.len(),
            owners = persisted,
            year,
            week,
            "processed summary batch"
        );
        CycleOutcome::Processed(batch.len())
    }

    /// Accumulate up to `batch_size` tasks. An empty pop ends the drain; a
    /// malformed payload is discarded and draining continues; a transport
    /// error ends the drain with whatever was collected.
    async fn drain(&self) -> Vec<SummaryTask> {
        let mut batch = Vec::new();
        while batch.len() < self.settings.batch_size {
            match self.queue.pop_blocking(self.settings.drain_timeout).await {
                Ok(Some(task)) => batch.push(task),
                Ok(None) => break,
                Err(QueueError::Serde(err)) => {
                    warn!(?err, "discarding malformed task payload");
                }
                Err(err) => {
                    warn!(?err, "queue pop failed; ending drain");
                    break;
                }
            }
        }
        batch
    }

    /// Push the originally drained tasks back onto the tail. Best-effort: a
    /// task that fails to requeue is lost for this cycle.
    async fn requeue(&self, batch: Vec<SummaryTask>) -> usize {
        let mut requeued = 0usize;
        for task in batch {
            if let Err(err) = self.queue.push(&task).await {
                warn!(?err, owner_id = task.owner_id, "failed to requeue task; dropping");
                continue;
            }
            requeued += 1;
        }
        requeued
    }
}

/// Collapse a drained batch into owner -> one concatenated text, keeping
/// drain order for each owner's bodies.
pub fn merge_batch(batch: &[SummaryTask]) -> BTreeMap<i64, String> {
    let mut bodies: BTreeMap<i64, Vec<&str>> = BTreeMap::new();
    for task in batch {
        bodies
            .entry(task.owner_id)
            .or_default()
            .extend(task.entries.iter().map(String::as_str));
    }
    bodies
        .into_iter()
        .map(|(owner_id, parts)| (owner_id, parts.join("\n\n")))
        .collect()
}
