use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header;
use read_analytics::analytics::queue::{AggregationQueue, RetryPolicy};
use read_analytics::analytics::recorder::ReadRecorder;
use read_analytics::analytics::worker::AggregationWorker;
use read_analytics::config::Config;
use read_analytics::logging::{init_tracing, LogConfig};
use read_analytics::routes::build_router;
use read_analytics::state::AppState;
use read_analytics::store::Store;
use read_analytics::workers::WorkerManager;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upper bound on waiting for the recorder and aggregation workers to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!(config = ?config, "Starting read-analytics");

    let store = Arc::new(Store::open(&config.sled_path).expect("Failed to open sled database"));
    store.run_migrations().expect("Failed to run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let queue = AggregationQueue::new(store.clone(), RetryPolicy::from_config(&config.queue));
    if let Err(e) = queue.restore().await {
        tracing::error!(error = %e, "Failed to restore analytics tasks");
    }

    let (recorder, recorder_loop) =
        ReadRecorder::new(store.clone(), queue.clone(), config.recorder.channel_capacity);
    let mut background = vec![tokio::spawn(recorder_loop.run(shutdown_tx.subscribe()))];

    let worker = AggregationWorker::new(
        store.clone(),
        queue.clone(),
        Duration::from_secs(config.worker.task_timeout_secs),
    );
    background.extend(worker.spawn_pool(config.worker.concurrency, &shutdown_tx));

    let state = AppState::new(
        store.clone(),
        queue.clone(),
        recorder,
        &config,
    );

    if config.worker.is_leader {
        let worker_manager = WorkerManager::new(
            store.clone(),
            queue.clone(),
            state.read_limiter().clone(),
            shutdown_tx.subscribe(),
            &config.worker,
        );
        // cron 调度作为独立后台任务运行，失败仅记录错误，不终止 HTTP 服务器
        background.push(tokio::spawn(async move {
            if let Err(e) = worker_manager.start().await {
                tracing::error!(error = %e, "Worker manager failed");
            }
        }));
    }

    let cors_layer = build_cors_layer(&config);

    let app = build_router(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    let server_future = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()));

    if let Err(e) = server_future.await {
        tracing::error!(error = %e, "HTTP server crashed");
        let _ = shutdown_tx.send(());
    }

    let drained = tokio::time::timeout(
        SHUTDOWN_GRACE,
        futures::future::join_all(background),
    )
    .await;
    match drained {
        Ok(results) => {
            for result in results.into_iter().filter_map(Result::err) {
                tracing::error!(error = %result, "Background task panicked");
            }
        }
        Err(_) => tracing::warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Background tasks did not drain in time"
        ),
    }

    let stats = queue.stats().await;
    tracing::info!(
        pending = stats.pending,
        in_flight = stats.in_flight,
        "Analytics queue at shutdown (journaled tasks resume on restart)"
    );

    tracing::info!("Flushing store before exit");
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origin.trim() == "*" {
        // 通配符模式仅用于开发环境，通配符与 credentials 互斥
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_credentials(false)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any);
    }

    match config.cors_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any),
        Err(e) => {
            panic!(
                "FATAL: Invalid CORS_ORIGIN '{}': {}. \
                 Fix the CORS_ORIGIN environment variable.",
                config.cors_origin, e
            );
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
