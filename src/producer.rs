//! Summary production: one pass over the week that just ended.

use crate::clock::Clock;
use crate::crypto::Codec;
use crate::db;
use crate::model::{manifest_key, previous_iso_week, previous_week_window, BatchManifest, SummaryTask};
use crate::queue::TaskQueue;
use crate::store::KvStore;
use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// How long a batch manifest stays readable after its run.
const MANIFEST_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerReport {
    /// Entries found inside the window, including any that failed to
    /// decrypt.
    pub entries_seen: usize,
    /// Tasks successfully pushed onto the queue, one per owner.
    pub tasks_queued: usize,
}

/// Scan the previous week's entries, group decrypted bodies by owner, push
/// one task per owner, and record the batch manifest.
///
/// Per-entry decryption failures and per-owner push failures are logged and
/// skipped; only the entry scan itself can fail the run. The manifest is
/// written even when the window held no entries at all.
#[instrument(skip_all)]
pub async fn run_once(
    pool: &SqlitePool,
    codec: &Codec,
    queue: &TaskQueue,
    kv: &dyn KvStore,
    clock: &dyn Clock,
) -> Result<ProducerReport> {
    let now = clock.now_utc();
    let (start, end) = previous_week_window(now);
    let entries = db::find_entries_in_range(pool, start, end).await?;
    info!(count = entries.len(), %start, %end, "scanning entries for summary window");

    let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for entry in &entries {
        match codec.decrypt(&entry.encrypted_content) {
            Ok(body) => grouped.entry(entry.owner_id).or_default().push(body),
            Err(err) => {
                warn!(
                    ?err,
                    owner_id = entry.owner_id,
                    entry_id = entry.id,
                    "failed to decrypt entry; skipping"
                );
            }
        }
    }

    let mut tasks_queued = 0usize;
    for (owner_id, bodies) in grouped {
        let task = SummaryTask {
            owner_id,
            entries: bodies,
        };
        if let Err(err) = queue.push(&task).await {
            warn!(?err, owner_id, "failed to enqueue summary task; dropping for this run");
            continue;
        }
        tasks_queued += 1;
    }

    let (year, week) = previous_iso_week(now);
    let manifest = BatchManifest {
        year,
        week,
        task_count: tasks_queued,
        timestamp: now,
    };
    let payload = serde_json::to_string(&manifest)?;
    if let Err(err) = kv.set_ex(&manifest_key(year, week), &payload, MANIFEST_TTL).await {
        warn!(?err, year, week, "failed to record batch manifest");
    }

    info!(tasks = tasks_queued, year, week, "summary production run complete");
    Ok(ProducerReport {
        entries_seen: entries.len(),
        tasks_queued,
    })
}
