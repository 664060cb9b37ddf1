//! Daily tick (00:05 UTC): enqueue one aggregation task per article read yesterday.
//! A failing tick is logged and abandoned; the next tick does not backfill.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::analytics::queue::AggregationQueue;
use crate::analytics::types::EnqueueOutcome;
use crate::analytics::{day_bounds, utc_day, AnalyticsError, ReadAnalyticsStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupReport {
    pub date: NaiveDate,
    pub discovered: usize,
    pub admitted: usize,
    pub duplicates: usize,
}

pub async fn run(store: Arc<dyn ReadAnalyticsStore>, queue: AggregationQueue) {
    let today = utc_day(Utc::now());
    match run_for(store, &queue, today).await {
        Ok(report) => tracing::info!(
            date = %report.date,
            discovered = report.discovered,
            admitted = report.admitted,
            duplicates = report.duplicates,
            "Daily rollup tick complete"
        ),
        Err(e) => tracing::error!(today = %today, error = %e, "Daily rollup tick failed"),
    }
}

/// Enqueue `(article, today - 1)` for every article with a read in that day.
pub async fn run_for(
    store: Arc<dyn ReadAnalyticsStore>,
    queue: &AggregationQueue,
    today: NaiveDate,
) -> Result<RollupReport, AnalyticsError> {
    let date = today
        .pred_opt()
        .ok_or(AnalyticsError::DateOutOfRange(today))?;
    let (start, end) = day_bounds(date)?;

    let articles =
        tokio::task::spawn_blocking(move || store.distinct_articles_with_events(start, end))
            .await
            .map_err(|e| AnalyticsError::Join(e.to_string()))??;

    let mut report = RollupReport {
        date,
        discovered: articles.len(),
        admitted: 0,
        duplicates: 0,
    };
    for article_id in &articles {
        match queue.enqueue(article_id, date).await? {
            EnqueueOutcome::Admitted => report.admitted += 1,
            EnqueueOutcome::Duplicate => report.duplicates += 1,
        }
    }
    Ok(report)
}
