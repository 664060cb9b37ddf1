use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use read_analytics::analytics::queue::{AggregationQueue, RetryPolicy};
use read_analytics::analytics::recorder::ReadRecorder;
use read_analytics::analytics::worker::AggregationWorker;
use read_analytics::config::{Config, QueueConfig, ReadLimitConfig, RecorderConfig, WorkerConfig};
use read_analytics::routes::build_router;
use read_analytics::state::AppState;
use read_analytics::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub store: Arc<Store>,
    pub queue: AggregationQueue,
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
    _temp_dir: TempDir,
}

impl TestApp {
    /// Broadcast shutdown and wait for the recorder and workers to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for handle in self.handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("background task stops")
                .expect("background task join");
        }
    }
}

fn test_config(sled_path: String, read_window_secs: u64) -> Config {
    // 直接构造 Config，避免使用 set_var 造成多线程测试环境变量竞态
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        jwt_secret: format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4()),
        cors_origin: "http://localhost:5173".to_string(),
        trust_proxy: true,
        read_limit: ReadLimitConfig {
            window_secs: read_window_secs,
            max_records: 1,
        },
        worker: WorkerConfig {
            is_leader: false,
            concurrency: 2,
            task_timeout_secs: 5,
            ..WorkerConfig::default()
        },
        queue: QueueConfig {
            max_attempts: 3,
            backoff_base_ms: 0,
        },
        recorder: RecorderConfig {
            channel_capacity: 64,
        },
    }
}

pub async fn spawn_with_read_window(read_window_secs: u64) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("read-analytics-test.sled");
    let config = test_config(sled_path.to_string_lossy().to_string(), read_window_secs);

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let queue = AggregationQueue::new(store.clone(), RetryPolicy::from_config(&config.queue));
    let (recorder, recorder_loop) =
        ReadRecorder::new(store.clone(), queue.clone(), config.recorder.channel_capacity);

    let mut handles = vec![tokio::spawn(recorder_loop.run(shutdown_tx.subscribe()))];
    let worker = AggregationWorker::new(
        store.clone(),
        queue.clone(),
        Duration::from_secs(config.worker.task_timeout_secs),
    );
    handles.extend(worker.spawn_pool(config.worker.concurrency, &shutdown_tx));

    let state = AppState::new(
        store.clone(),
        queue.clone(),
        recorder,
        &config,
    );
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        store,
        queue,
        shutdown_tx,
        handles,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with_read_window(30).await
}

/// Poll `check` until it returns true or five seconds pass.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
