use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::analytics::types::{
    AggregationTask, ClaimedTask, EnqueueOutcome, FailureOutcome, JournaledTask, QueueStats,
    TaskId,
};
use crate::analytics::{AnalyticsError, TaskJournal};
use crate::config::QueueConfig;
use crate::store::keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total executions allowed per task, first run included.
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Delay before the retry that follows the `attempts_made`-th failure:
    /// base, 2×base, 4×base, …
    pub fn backoff_delay(&self, attempts_made: u32) -> Duration {
        let exponent = attempts_made.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    InFlight,
}

#[derive(Debug, Clone)]
struct Entry {
    task: AggregationTask,
    attempts_made: u32,
    state: EntryState,
    ready_at: Instant,
    enqueued_at: DateTime<Utc>,
}

impl Entry {
    fn journaled(&self) -> JournaledTask {
        JournaledTask {
            task: self.task.clone(),
            attempts_made: self.attempts_made,
            enqueued_at: self.enqueued_at,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    entries: HashMap<TaskId, Entry>,
}

impl QueueState {
    fn take_ready(&mut self, now: Instant) -> Option<ClaimedTask> {
        let entry = self
            .entries
            .values_mut()
            .filter(|e| e.state == EntryState::Pending && e.ready_at <= now)
            .min_by_key(|e| e.ready_at)?;
        entry.state = EntryState::InFlight;
        Some(ClaimedTask {
            task: entry.task.clone(),
            attempt: entry.attempts_made + 1,
        })
    }

    fn next_ready_at(&self) -> Option<Instant> {
        self.entries
            .values()
            .filter(|e| e.state == EntryState::Pending)
            .map(|e| e.ready_at)
            .min()
    }
}

struct Inner {
    journal: Arc<dyn TaskJournal>,
    policy: RetryPolicy,
    state: Mutex<QueueState>,
    notify: Notify,
}

/// At-least-once work queue of `(article, day)` aggregation tasks.
///
/// Every admitted task is journaled before it becomes visible, so a restart
/// picks pending work back up via [`AggregationQueue::restore`]. A task id is
/// tracked from admission until success or drop; enqueues of an id that is
/// already tracked (pending or in flight) are no-ops.
#[derive(Clone)]
pub struct AggregationQueue {
    inner: Arc<Inner>,
}

impl AggregationQueue {
    pub fn new(journal: Arc<dyn TaskJournal>, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                journal,
                policy,
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Re-admit every journaled task as immediately ready. Returns how many were restored.
    pub async fn restore(&self) -> Result<usize, AnalyticsError> {
        let journaled = self.inner.journal.load_tasks()?;
        let mut state = self.inner.state.lock().await;
        let now = Instant::now();
        let mut restored = 0usize;
        for entry in journaled {
            let task_id = entry.task.task_id.clone();
            if state.entries.contains_key(&task_id) {
                continue;
            }
            state.entries.insert(
                task_id,
                Entry {
                    task: entry.task,
                    attempts_made: entry.attempts_made,
                    state: EntryState::Pending,
                    ready_at: now,
                    enqueued_at: entry.enqueued_at,
                },
            );
            restored += 1;
        }
        drop(state);

        if restored > 0 {
            tracing::info!(restored, "Restored journaled analytics tasks");
            self.inner.notify.notify_one();
        }
        Ok(restored)
    }

    pub async fn enqueue(
        &self,
        article_id: &str,
        date: NaiveDate,
    ) -> Result<EnqueueOutcome, AnalyticsError> {
        keys::article_key(article_id)?;
        let task = AggregationTask::new(article_id, date);

        let mut state = self.inner.state.lock().await;
        if state.entries.contains_key(&task.task_id) {
            tracing::debug!(task_id = %task.task_id, "Analytics task already queued");
            return Ok(EnqueueOutcome::Duplicate);
        }

        let entry = Entry {
            task,
            attempts_made: 0,
            state: EntryState::Pending,
            ready_at: Instant::now(),
            enqueued_at: Utc::now(),
        };
        self.inner.journal.persist_task(&entry.journaled())?;
        tracing::debug!(task_id = %entry.task.task_id, "Analytics task admitted");
        state.entries.insert(entry.task.task_id.clone(), entry);
        drop(state);

        self.inner.notify.notify_one();
        Ok(EnqueueOutcome::Admitted)
    }

    /// Claim a ready task without waiting.
    pub async fn try_claim(&self) -> Option<ClaimedTask> {
        self.inner.state.lock().await.take_ready(Instant::now())
    }

    /// Wait until a task is ready and claim it. Cancel-safe: the claim happens
    /// atomically inside a single poll.
    pub async fn claim(&self) -> ClaimedTask {
        loop {
            let notified = self.inner.notify.notified();
            let wake_at = {
                let mut state = self.inner.state.lock().await;
                if let Some(claimed) = state.take_ready(Instant::now()) {
                    return claimed;
                }
                state.next_ready_at()
            };

            match wake_at {
                Some(at) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Permanently remove a task after its aggregation succeeded.
    pub async fn complete(&self, task_id: &TaskId) -> Result<(), AnalyticsError> {
        let removed = self.inner.state.lock().await.entries.remove(task_id);
        if removed.is_none() {
            return Err(AnalyticsError::UnknownTask(task_id.to_string()));
        }
        self.inner.journal.remove_task(task_id)?;
        Ok(())
    }

    /// Record a failed attempt: reschedule with backoff, or drop once the
    /// attempt budget is spent.
    pub async fn fail(
        &self,
        task_id: &TaskId,
        error: &str,
    ) -> Result<FailureOutcome, AnalyticsError> {
        let policy = self.inner.policy;
        let mut state = self.inner.state.lock().await;
        let entry = state
            .entries
            .get_mut(task_id)
            .ok_or_else(|| AnalyticsError::UnknownTask(task_id.to_string()))?;
        entry.attempts_made += 1;
        let attempt = entry.attempts_made;

        if attempt >= policy.max_attempts {
            let Some(dropped) = state.entries.remove(task_id) else {
                return Err(AnalyticsError::UnknownTask(task_id.to_string()));
            };
            drop(state);

            tracing::error!(
                task_id = %task_id,
                article_id = %dropped.task.article_id,
                date = %dropped.task.date,
                attempt,
                error,
                "Analytics task exhausted retries, dropping"
            );
            if let Err(e) = self.inner.journal.remove_task(task_id) {
                tracing::warn!(task_id = %task_id, error = %e, "Failed to remove dropped task from journal");
            }
            return Ok(FailureOutcome::Dropped { attempts: attempt });
        }

        let delay = policy.backoff_delay(attempt);
        entry.state = EntryState::Pending;
        entry.ready_at = Instant::now() + delay;
        let journaled = entry.journaled();
        drop(state);

        tracing::warn!(
            task_id = %task_id,
            article_id = %journaled.task.article_id,
            date = %journaled.task.date,
            attempt,
            retry_in_ms = delay.as_millis() as u64,
            error,
            "Analytics task failed, retry scheduled"
        );
        if let Err(e) = self.inner.journal.persist_task(&journaled) {
            tracing::warn!(task_id = %task_id, error = %e, "Failed to journal retry state");
        }

        self.inner.notify.notify_one();
        Ok(FailureOutcome::Retry {
            next_attempt: attempt + 1,
            delay,
        })
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().await;
        let in_flight = state
            .entries
            .values()
            .filter(|e| e.state == EntryState::InFlight)
            .count();
        QueueStats {
            pending: state.entries.len() - in_flight,
            in_flight,
        }
    }

    /// Snapshot of tasks waiting to be claimed, ordered by id.
    pub async fn pending_tasks(&self) -> Vec<AggregationTask> {
        let state = self.inner.state.lock().await;
        let mut tasks: Vec<_> = state
            .entries
            .values()
            .filter(|e| e.state == EntryState::Pending)
            .map(|e| e.task.clone())
            .collect();
        tasks.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        tasks
    }
}
