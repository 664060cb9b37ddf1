use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::analytics::types::{JournaledTask, TaskId};
use crate::store::operations::daily_aggregates::DailyAggregate;
use crate::store::{Store, StoreError};

/// Data access the pipeline needs from the event store. Methods are blocking;
/// async callers go through `spawn_blocking`.
pub trait ReadAnalyticsStore: Send + Sync + 'static {
    /// Append one read event, returning its id.
    fn append_read_event(
        &self,
        article_id: &str,
        reader_id: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> Result<String, StoreError>;

    fn count_read_events(
        &self,
        article_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    fn upsert_daily_aggregate(
        &self,
        article_id: &str,
        date: NaiveDate,
        view_count: u64,
    ) -> Result<DailyAggregate, StoreError>;

    fn distinct_articles_with_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, StoreError>;
}

/// Durable backing for the aggregation queue.
pub trait TaskJournal: Send + Sync + 'static {
    fn persist_task(&self, entry: &JournaledTask) -> Result<(), StoreError>;
    fn remove_task(&self, task_id: &TaskId) -> Result<(), StoreError>;
    fn load_tasks(&self) -> Result<Vec<JournaledTask>, StoreError>;
}

impl ReadAnalyticsStore for Store {
    fn append_read_event(
        &self,
        article_id: &str,
        reader_id: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        Store::append_read_event(self, article_id, reader_id, occurred_at).map(|event| event.id)
    }

    fn count_read_events(
        &self,
        article_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        Store::count_read_events(self, article_id, start, end)
    }

    fn upsert_daily_aggregate(
        &self,
        article_id: &str,
        date: NaiveDate,
        view_count: u64,
    ) -> Result<DailyAggregate, StoreError> {
        Store::upsert_daily_aggregate(self, article_id, date, view_count)
    }

    fn distinct_articles_with_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, StoreError> {
        Store::distinct_articles_with_events(self, start, end)
    }
}

impl TaskJournal for Store {
    fn persist_task(&self, entry: &JournaledTask) -> Result<(), StoreError> {
        self.save_analytics_task(entry)
    }

    fn remove_task(&self, task_id: &TaskId) -> Result<(), StoreError> {
        self.remove_analytics_task(task_id)
    }

    fn load_tasks(&self) -> Result<Vec<JournaledTask>, StoreError> {
        self.load_analytics_tasks()
    }
}
