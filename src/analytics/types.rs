use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Stable identity of an aggregation task. Two enqueues for the same
/// article/day always produce the same id, which is what the queue dedupes on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn for_key(article_id: &str, date: NaiveDate) -> Self {
        Self(format!("analytics:{}:{}", article_id, date.format("%Y-%m-%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationTask {
    pub task_id: TaskId,
    pub article_id: String,
    pub date: NaiveDate,
}

impl AggregationTask {
    pub fn new(article_id: impl Into<String>, date: NaiveDate) -> Self {
        let article_id = article_id.into();
        Self {
            task_id: TaskId::for_key(&article_id, date),
            article_id,
            date,
        }
    }
}

/// What the queue persists per admitted task, so pending work and its retry
/// budget survive a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournaledTask {
    pub task: AggregationTask,
    pub attempts_made: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// A task handed to one worker. `attempt` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    pub task: AggregationTask,
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Admitted,
    /// A task with the same id was already pending or in flight.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Retry {
        next_attempt: u32,
        delay: std::time::Duration,
    },
    Dropped {
        attempts: u32,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
}
