//! Database row types used by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business
//! logic lives in the producer, worker, and cache.

use chrono::NaiveDate;

/// One journal entry as stored: content stays encrypted until a consumer
/// explicitly decrypts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub id: i64,
    pub owner_id: i64,
    pub date: NaiveDate,
    pub encrypted_content: String,
}

/// One weekly summary row; `summary` is encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub id: i64,
    pub owner_id: i64,
    pub week_number: u32,
    pub year: i32,
    pub summary: String,
}
