use std::sync::Arc;
use std::time::Instant;

use crate::analytics::queue::AggregationQueue;
use crate::analytics::recorder::ReadRecorder;
use crate::config::Config;
use crate::middleware::read_limit::ReadRateLimiter;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    queue: AggregationQueue,
    recorder: ReadRecorder,
    read_limiter: ReadRateLimiter,
    config: Arc<Config>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        queue: AggregationQueue,
        recorder: ReadRecorder,
        config: &Config,
    ) -> Self {
        Self {
            store,
            queue,
            recorder,
            read_limiter: ReadRateLimiter::from_config(&config.read_limit),
            config: Arc::new(config.clone()),
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn queue(&self) -> &AggregationQueue {
        &self.queue
    }

    pub fn recorder(&self) -> &ReadRecorder {
        &self.recorder
    }

    pub fn read_limiter(&self) -> &ReadRateLimiter {
        &self.read_limiter
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use crate::analytics::queue::RetryPolicy;
    use crate::store::test_support::temp_store;

    use super::*;

    fn build_state(name: &str) -> (tempfile::TempDir, AppState) {
        let cfg = Config::from_env();
        let (tmp, store) = temp_store(name);
        let store = Arc::new(store);
        let queue = AggregationQueue::new(store.clone(), RetryPolicy::default());
        let (recorder, _loop) = ReadRecorder::new(store.clone(), queue.clone(), 8);
        let state = AppState::new(store, queue, recorder, &cfg);
        (tmp, state)
    }

    #[test]
    fn fresh_state_reports_zero_uptime() {
        let (_tmp, state) = build_state("state_uptime.sled");
        assert_eq!(state.uptime_secs(), 0);
        assert!(state.config().read_limit.max_records >= 1);
    }

    #[tokio::test]
    async fn clones_share_queue_and_limiter() {
        let (_tmp, state) = build_state("state_shared.sled");
        let other = state.clone();

        state
            .queue()
            .enqueue("a1", chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(other.queue().stats().await.pending, 1);

        let key = crate::middleware::read_limit::ReadKey::new(None, None, "a1");
        assert!(state.read_limiter().check(&key).await);
        assert!(!other.read_limiter().check(&key).await);
    }
}
