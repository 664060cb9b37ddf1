use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};

use crate::analytics::queue::AggregationQueue;
use crate::analytics::types::EnqueueOutcome;
use crate::analytics::{utc_day, AnalyticsError, ReadAnalyticsStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCommand {
    pub article_id: String,
    pub reader_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Request-side handle. Cheap to clone; [`ReadRecorder::record`] never waits.
#[derive(Debug, Clone)]
pub struct ReadRecorder {
    tx: mpsc::Sender<ReadCommand>,
}

/// Background half: appends events and enqueues today's aggregation task.
pub struct RecorderLoop {
    rx: mpsc::Receiver<ReadCommand>,
    store: Arc<dyn ReadAnalyticsStore>,
    queue: AggregationQueue,
}

impl ReadRecorder {
    pub fn new(
        store: Arc<dyn ReadAnalyticsStore>,
        queue: AggregationQueue,
        capacity: usize,
    ) -> (Self, RecorderLoop) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, RecorderLoop { rx, store, queue })
    }

    /// Hand a read to the background loop. Returns `false` when the read was
    /// dropped (channel full or closed); analytics is best-effort, so callers
    /// ignore it.
    pub fn record(&self, article_id: &str, reader_id: Option<&str>) -> bool {
        let command = ReadCommand {
            article_id: article_id.to_string(),
            reader_id: reader_id.map(str::to_string),
            occurred_at: Utc::now(),
        };
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                tracing::warn!(article_id = %cmd.article_id, "Read recorder backlog full, dropping read event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(cmd)) => {
                tracing::warn!(article_id = %cmd.article_id, "Read recorder stopped, dropping read event");
                false
            }
        }
    }
}

impl RecorderLoop {
    /// Append the event, then enqueue aggregation for the event's UTC day.
    pub async fn apply(&self, command: ReadCommand) -> Result<EnqueueOutcome, AnalyticsError> {
        let store = self.store.clone();
        let article_id = command.article_id.clone();
        let reader_id = command.reader_id.clone();
        let occurred_at = command.occurred_at;
        let event_id = tokio::task::spawn_blocking(move || {
            store.append_read_event(&article_id, reader_id.as_deref(), occurred_at)
        })
        .await
        .map_err(|e| AnalyticsError::Join(e.to_string()))??;

        tracing::debug!(article_id = %command.article_id, event_id = %event_id, "Read event appended");
        self.queue
            .enqueue(&command.article_id, utc_day(command.occurred_at))
            .await
    }

    async fn apply_logged(&self, command: ReadCommand) {
        let article_id = command.article_id.clone();
        if let Err(e) = self.apply(command).await {
            tracing::error!(article_id = %article_id, error = %e, "Failed to record read event");
        }
    }

    /// Process reads until shutdown, then drain whatever is already buffered.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.apply_logged(command).await,
                    None => break,
                },
                _ = shutdown_rx.recv() => {
                    self.rx.close();
                    let mut drained = 0usize;
                    while let Some(command) = self.rx.recv().await {
                        self.apply_logged(command).await;
                        drained += 1;
                    }
                    tracing::info!(drained, "Read recorder drained");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{NaiveDate, TimeZone};

    use crate::analytics::queue::RetryPolicy;
    use crate::store::test_support::temp_store;
    use crate::store::Store;

    use super::*;

    fn setup(name: &str, capacity: usize) -> (tempfile::TempDir, Arc<Store>, AggregationQueue, ReadRecorder, RecorderLoop) {
        let (tmp, store) = temp_store(name);
        let store = Arc::new(store);
        let queue = AggregationQueue::new(store.clone(), RetryPolicy::default());
        let (recorder, recorder_loop) = ReadRecorder::new(store.clone(), queue.clone(), capacity);
        (tmp, store, queue, recorder, recorder_loop)
    }

    #[tokio::test]
    async fn apply_appends_and_enqueues_for_event_day() {
        let (_tmp, store, queue, _recorder, recorder_loop) = setup("recorder_apply.sled", 8);
        let occurred_at = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();

        let outcome = recorder_loop
            .apply(ReadCommand {
                article_id: "a1".to_string(),
                reader_id: Some("r1".to_string()),
                occurred_at,
            })
            .await
            .unwrap();

        assert_eq!(outcome, EnqueueOutcome::Admitted);
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let (start, end) = crate::analytics::day_bounds(date).unwrap();
        assert_eq!(store.count_read_events("a1", start, end).unwrap(), 1);
        let pending = queue.pending_tasks().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].date, date);
    }

    #[tokio::test]
    async fn invalid_article_is_swallowed_by_loop() {
        let (_tmp, store, queue, recorder, recorder_loop) = setup("recorder_invalid.sled", 8);
        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = tokio::spawn(recorder_loop.run(shutdown_tx.subscribe()));

        assert!(recorder.record("bad:id", None));
        assert!(recorder.record("a1", None));
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop exits")
            .expect("join");

        assert_eq!(store.read_events.len(), 1);
        assert_eq!(queue.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (_tmp, _store, _queue, recorder, _recorder_loop) = setup("recorder_full.sled", 1);
        assert!(recorder.record("a1", None));
        assert!(!recorder.record("a1", None));
    }

    #[tokio::test]
    async fn record_after_loop_stops_is_dropped() {
        let (_tmp, _store, _queue, recorder, recorder_loop) = setup("recorder_closed.sled", 4);
        drop(recorder_loop);
        assert!(!recorder.record("a1", None));
    }
}
