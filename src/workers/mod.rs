pub mod daily_rollup;
pub mod read_limiter_cleanup;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::analytics::queue::AggregationQueue;
use crate::analytics::ReadAnalyticsStore;
use crate::config::WorkerConfig;
use crate::middleware::read_limit::ReadRateLimiter;

/// Timeout for individual worker invocations (5 minutes).
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Drain period before scheduler shutdown to let in-flight ticks complete.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const READ_LIMITER_CLEANUP_CRON: &str = "0 */5 * * * *";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    DailyRollup,
    ReadLimiterCleanup,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DailyRollup => "daily_rollup",
            Self::ReadLimiterCleanup => "read_limiter_cleanup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: String,
    pub enabled: bool,
}

/// Cron side of the pipeline. The aggregation pool itself is not scheduled
/// here; it runs on every instance and only consumes the queue.
pub struct WorkerManager {
    store: Arc<dyn ReadAnalyticsStore>,
    queue: AggregationQueue,
    read_limiter: ReadRateLimiter,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
}

impl WorkerManager {
    pub fn new(
        store: Arc<dyn ReadAnalyticsStore>,
        queue: AggregationQueue,
        read_limiter: ReadRateLimiter,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            read_limiter,
            shutdown_rx,
            config: config.clone(),
        }
    }

    /// Single source of truth for all planned jobs and their cron schedules
    /// (`sec min hour day month weekday`, UTC).
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::DailyRollup,
                cron: self.config.daily_rollup_cron.clone(),
                enabled: true,
            },
            JobSpec {
                name: WorkerName::ReadLimiterCleanup,
                cron: READ_LIMITER_CLEANUP_CRON.to_string(),
                enabled: true,
            },
        ]
    }

    /// Start the scheduler and block until shutdown is broadcast.
    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping cron scheduler");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;

        let registered = self.register_jobs(&scheduler).await;

        scheduler.start().await?;

        tracing::info!(registered, "Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            drain_ms = DRAIN_TIMEOUT.as_millis() as u64,
            "Worker manager shutting down"
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    /// Register every enabled job from `planned_jobs()`. Returns how many
    /// were accepted by the scheduler.
    async fn register_jobs(&self, scheduler: &JobScheduler) -> usize {
        let mut registered = 0;

        for spec in self.planned_jobs() {
            if !spec.enabled {
                tracing::info!(name = spec.name.as_str(), "Skipping disabled worker");
                continue;
            }

            let name_str = spec.name.as_str();
            let added = match spec.name {
                WorkerName::DailyRollup => {
                    let store = self.store.clone();
                    let queue = self.queue.clone();
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let store = store.clone();
                        let queue = queue.clone();
                        async move {
                            daily_rollup::run(store, queue).await;
                        }
                    })
                    .await
                }
                WorkerName::ReadLimiterCleanup => {
                    let limiter = self.read_limiter.clone();
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let limiter = limiter.clone();
                        async move {
                            read_limiter_cleanup::run(&limiter).await;
                        }
                    })
                    .await
                }
            };

            if added {
                registered += 1;
                tracing::info!(name = name_str, cron = %spec.cron, "Registered worker");
            }
        }
        registered
    }
}

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F) -> bool
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                worker = name,
                "Skipping worker invocation: previous run still in progress"
            );
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => match scheduler.add(job).await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(error = %err, cron, worker = name, "Failed to add worker job");
                false
            }
        },
        Err(err) => {
            tracing::error!(error = %err, cron, worker = name, "Failed to create worker job");
            false
        }
    }
}
