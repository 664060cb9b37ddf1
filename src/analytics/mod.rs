//! Read-analytics pipeline: raw read events in, daily per-article view counts out.
//!
//! The request path hands reads to the [`recorder::ReadRecorder`]; it appends
//! the event and enqueues an [`types::AggregationTask`] on the
//! [`queue::AggregationQueue`]. A pool of [`worker::AggregationWorker`]s drains
//! the queue and overwrites the rollup with a full recount, so re-delivery and
//! overlapping enqueues never double count.

pub mod queue;
pub mod recorder;
pub mod store;
pub mod types;
pub mod worker;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use thiserror::Error;

use crate::store::StoreError;

pub use self::store::{ReadAnalyticsStore, TaskJournal};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("task {task_id} timed out after {timeout_ms}ms")]
    Timeout { task_id: String, timeout_ms: u64 },
    #[error("blocking task failed: {0}")]
    Join(String),
    #[error("unknown task: {0}")]
    UnknownTask(String),
    #[error("date out of range: {0}")]
    DateOutOfRange(NaiveDate),
}

/// Half-open UTC interval `[date 00:00:00Z, date+1 00:00:00Z)`.
pub fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), AnalyticsError> {
    let midnight = |day: NaiveDate| {
        day.and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or(AnalyticsError::DateOutOfRange(date))
    };
    let next = date
        .succ_opt()
        .ok_or(AnalyticsError::DateOutOfRange(date))?;
    Ok((midnight(date)?, midnight(next)?))
}

/// The UTC calendar day an instant falls in.
pub fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_cover_exactly_one_day() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let (start, end) = day_bounds(date).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-02-29T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn last_representable_day_is_rejected() {
        assert!(matches!(
            day_bounds(NaiveDate::MAX),
            Err(AnalyticsError::DateOutOfRange(_))
        ));
    }

    #[test]
    fn utc_day_uses_utc_calendar() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        assert_eq!(utc_day(at), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
