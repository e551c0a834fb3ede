use super::model::{EntryRow, SummaryRow};
use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let pool = SqlitePool::connect(database_url).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert one entry for (owner, date). The unique index on (owner_id, date)
/// rejects a second entry for the same day.
#[instrument(skip_all)]
pub async fn insert_entry(
    pool: &Pool,
    owner_id: i64,
    date: NaiveDate,
    encrypted_content: &str,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO entries (owner_id, date, encrypted_content) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(owner_id)
    .bind(date)
    .bind(encrypted_content)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

/// All entries with `start <= date < end`, oldest first so per-owner bodies
/// group in writing order.
#[instrument(skip_all)]
pub async fn find_entries_in_range(
    pool: &Pool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<EntryRow>> {
    let rows = sqlx::query(
        "SELECT id, owner_id, date, encrypted_content FROM entries \
         WHERE date >= ? AND date < ? ORDER BY date ASC, id ASC",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| EntryRow {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            date: row.get("date"),
            encrypted_content: row.get("encrypted_content"),
        })
        .collect())
}

/// Whether the owner has an entry dated `date`.
#[instrument(skip_all)]
pub async fn has_entry_on_date(pool: &Pool, owner_id: i64, date: NaiveDate) -> Result<bool> {
    let exists: i64 =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM entries WHERE owner_id = ? AND date = ?)")
            .bind(owner_id)
            .bind(date)
            .fetch_one(pool)
            .await?;
    Ok(exists != 0)
}

/// Insert-or-replace the summary for (owner, week, year). Running the same
/// key twice converges to one row holding the latest encrypted text.
#[instrument(skip_all)]
pub async fn upsert_summary(
    pool: &Pool,
    owner_id: i64,
    week_number: u32,
    year: i32,
    encrypted_summary: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO summaries (owner_id, week_number, year, summary) VALUES (?, ?, ?, ?) \
         ON CONFLICT(owner_id, week_number, year) \
         DO UPDATE SET summary = excluded.summary, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(owner_id)
    .bind(week_number)
    .bind(year)
    .bind(encrypted_summary)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn summaries_for_owner(pool: &Pool, owner_id: i64) -> Result<Vec<SummaryRow>> {
    let rows = sqlx::query(
        "SELECT id, owner_id, week_number, year, summary FROM summaries \
         WHERE owner_id = ? ORDER BY year ASC, week_number ASC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SummaryRow {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            week_number: row.get("week_number"),
            year: row.get("year"),
            summary: row.get("summary"),
        })
        .collect())
}

#[instrument(skip_all)]
pub async fn get_summary(
    pool: &Pool,
    owner_id: i64,
    week_number: u32,
    year: i32,
) -> Result<Option<SummaryRow>> {
    let row = sqlx::query(
        "SELECT id, owner_id, week_number, year, summary FROM summaries \
         WHERE owner_id = ? AND week_number = ? AND year = ?",
    )
    .bind(owner_id)
    .bind(week_number)
    .bind(year)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| SummaryRow {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        week_number: row.get("week_number"),
        year: row.get("year"),
        summary: row.get("summary"),
    }))
}
