//! Domain types shared by the producer and the worker.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One unit of queued work: a single owner's unsummarized entry bodies, in
/// the order they were written. Lives only as a queue payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryTask {
    pub owner_id: i64,
    pub entries: Vec<String>,
}

/// Write-only observability record left behind by a producer run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchManifest {
    pub year: i32,
    pub week: u32,
    pub task_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Store key under which the manifest for an ISO (year, week) is recorded.
pub fn manifest_key(year: i32, week: u32) -> String {
    format!("batch:{year}:{week}")
}

/// ISO (year, week) of the week that ended before `now`, i.e. the bucket
/// summaries produced for that week land in.
pub fn previous_iso_week(now: DateTime<Utc>) -> (i32, u32) {
    let week = (now - Duration::days(7)).iso_week();
    (week.year(), week.week())
}

/// Half-open window `[start, end)` covering the calendar week before the one
/// containing `now`. Weeks start on Sunday, matching the weekly trigger.
pub fn previous_week_window(now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive();
    let days_back = i64::from(today.weekday().num_days_from_sunday()) + 7;
    let start = today - Duration::days(days_back);
    (start, start + Duration::days(7))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    #[test]
    fn task_payload_round_trips_as_json() {
        let task = SummaryTask {
            owner_id: 7,
            entries: vec!["first".into(), "second".into()],
        };
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(serde_json::from_str::<SummaryTask>(&json).unwrap(), task);
    }

    #[test]
    fn previous_week_window_is_sunday_aligned_and_half_open() {
        // 2024-03-20 is a Wednesday; the previous week ran 03-10..03-17.
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        let (start, end) = previous_week_window(now);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 17).unwrap());
        assert_eq!(start.weekday(), Weekday::Sun);
    }

    #[test]
    fn previous_iso_week_crosses_year_boundary() {
        let early_january = Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap();
        assert_eq!(previous_iso_week(early_january), (2023, 52));

        let mid_march = Utc.with_ymd_and_hms(2024, 3, 18, 9, 0, 0).unwrap();
        assert_eq!(previous_iso_week(mid_march), (2024, 11));
    }
}
