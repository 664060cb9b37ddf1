use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::analytics::queue::AggregationQueue;
use crate::analytics::types::{AggregationTask, ClaimedTask, FailureOutcome};
use crate::analytics::{day_bounds, AnalyticsError, ReadAnalyticsStore};
use crate::store::operations::daily_aggregates::DailyAggregate;

/// Recount one article/day and overwrite its rollup.
///
/// The count is always the total over `[date, date+1)`, never an increment.
pub fn recompute(
    store: &dyn ReadAnalyticsStore,
    article_id: &str,
    date: NaiveDate,
) -> Result<DailyAggregate, AnalyticsError> {
    let (start, end) = day_bounds(date)?;
    let view_count = store.count_read_events(article_id, start, end)?;
    Ok(store.upsert_daily_aggregate(article_id, date, view_count)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded(DailyAggregate),
    Failed(FailureOutcome),
}

#[derive(Clone)]
pub struct AggregationWorker {
    store: Arc<dyn ReadAnalyticsStore>,
    queue: AggregationQueue,
    task_timeout: Duration,
}

impl AggregationWorker {
    pub fn new(
        store: Arc<dyn ReadAnalyticsStore>,
        queue: AggregationQueue,
        task_timeout: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            task_timeout,
        }
    }

    /// Run [`recompute`] on the blocking pool, bounded by the task timeout.
    pub async fn process(&self, task: &AggregationTask) -> Result<DailyAggregate, AnalyticsError> {
        let store = self.store.clone();
        let article_id = task.article_id.clone();
        let date = task.date;
        let job = tokio::task::spawn_blocking(move || recompute(store.as_ref(), &article_id, date));

        match tokio::time::timeout(self.task_timeout, job).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(AnalyticsError::Join(join_err.to_string())),
            Err(_) => Err(AnalyticsError::Timeout {
                task_id: task.task_id.to_string(),
                timeout_ms: u64::try_from(self.task_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Process a claimed task and report the outcome back to the queue.
    pub async fn handle(&self, claimed: ClaimedTask) -> Result<TaskOutcome, AnalyticsError> {
        let task = &claimed.task;
        match self.process(task).await {
            Ok(aggregate) => {
                tracing::info!(
                    task_id = %task.task_id,
                    article_id = %task.article_id,
                    date = %task.date,
                    view_count = aggregate.view_count,
                    attempt = claimed.attempt,
                    "Daily aggregate upserted"
                );
                self.queue.complete(&task.task_id).await?;
                Ok(TaskOutcome::Succeeded(aggregate))
            }
            Err(e) => {
                let outcome = self.queue.fail(&task.task_id, &e.to_string()).await?;
                Ok(TaskOutcome::Failed(outcome))
            }
        }
    }

    /// Claim and handle tasks until shutdown. A task already being handled
    /// when shutdown arrives runs to completion.
    pub async fn run(self, worker_index: usize, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::debug!(worker_index, "Aggregation worker started");
        loop {
            tokio::select! {
                claimed = self.queue.claim() => {
                    let task_id = claimed.task.task_id.clone();
                    if let Err(e) = self.handle(claimed).await {
                        tracing::error!(worker_index, task_id = %task_id, error = %e, "Failed to settle analytics task");
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
        tracing::debug!(worker_index, "Aggregation worker stopped");
    }

    pub fn spawn_pool(
        self,
        size: usize,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        let size = size.max(1);
        tracing::info!(size, "Starting aggregation worker pool");
        (0..size)
            .map(|index| {
                let worker = self.clone();
                let shutdown_rx = shutdown_tx.subscribe();
                tokio::spawn(async move { worker.run(index, shutdown_rx).await })
            })
            .collect()
    }
}
