//! Read-through cache for "has this owner journaled today".
//!
//! The cache is strictly advisory: a store failure falls back to the
//! database, and a failed population never changes the answer, only its
//! latency on the next call.

use crate::clock::Clock;
use crate::db;
use crate::store::KvStore;
use anyhow::Result;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::warn;

const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn today_key(date: NaiveDate, owner_id: i64) -> String {
    format!("journal:today:{date}:{owner_id}")
}

/// Whether `owner_id` has an entry dated today (UTC). Cache hits answer
/// without touching the durable store; misses query it and populate the
/// cache with a 24-hour TTL.
pub async fn has_journaled_today(
    pool: &SqlitePool,
    kv: &dyn KvStore,
    clock: &dyn Clock,
    owner_id: i64,
) -> Result<bool> {
    let today = clock.now_utc().date_naive();
    let key = today_key(today, owner_id);

    match kv.get(&key).await {
        Ok(Some(cached)) => return Ok(cached == "true"),
        Ok(None) => {}
        Err(err) => warn!(?err, owner_id, "cache lookup failed; treating as miss"),
    }

    let found = db::has_entry_on_date(pool, owner_id, today).await?;
    let value = if found { "true" } else { "false" };
    if let Err(err) = kv.set_ex(&key, value, CACHE_TTL).await {
        warn!(?err, owner_id, "failed to populate journal-today cache");
    }
    Ok(found)
}
