mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::response::Html;
use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{notifications::NotificationQueue, queue::JobQueue};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing vehicle-bulk server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("import_jobs_submitted", "Total import jobs submitted");
    metrics::describe_counter!("export_jobs_submitted", "Total export jobs submitted");
    metrics::describe_counter!("jobs_completed", "Total jobs completed");
    metrics::describe_counter!("jobs_failed", "Total jobs that failed terminally");
    metrics::describe_counter!("vehicles_imported", "Total vehicle rows imported");
    metrics::describe_histogram!(
        "job_processing_seconds",
        "Time to process an import or export job"
    );
    metrics::describe_gauge!(
        "notification_connections",
        "Current number of live notification connections"
    );
    metrics::describe_gauge!("queue_depth", "Jobs waiting in the ready list, per kind");

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize Redis job and notification queues
    tracing::info!("Connecting to Redis");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");
    let notifications = NotificationQueue::new(&config.redis_url)
        .expect("Failed to initialize notification queue");

    // Create shared application state
    let state = AppState::new(
        db_pool,
        queue,
        notifications,
        &config.upload_dir,
        &config.export_dir,
    );

    // Drain worker notifications into the connection registry
    tokio::spawn(dispatch_notifications(state.clone()));
    tokio::spawn(report_queue_depth(state.clone()));

    // Build API routes
    let app = Router::new()
        // Static test page (embedded at compile time)
        .route("/", get(|| async { Html(include_str!("../static/index.html")) }))
        // API endpoints
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/upload", post(routes::upload::upload_spreadsheet))
        .route("/api/v1/export", post(routes::export::queue_export))
        .route(
            "/api/v1/export/{job_id}/download",
            get(routes::export::download_export),
        )
        .route("/api/v1/jobs/{job_id}", get(routes::jobs::get_job_status))
        .route("/api/v1/notify", post(routes::notify::send_notification))
        .route("/ws", get(routes::ws::ws_handler))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting vehicle-bulk on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

/// Pop worker notifications off Redis and hand them to the registry.
///
/// Undeliverable envelopes are logged and dropped; there is no replay.
async fn dispatch_notifications(state: AppState) {
    const IDLE_POLL: Duration = Duration::from_millis(250);

    loop {
        match state.notifications.pop().await {
            Ok(Some(envelope)) => {
                metrics::gauge!("notification_connections")
                    .set(state.registry.connection_count() as f64);
                state.registry.dispatch(envelope);
            }
            Ok(None) => tokio::time::sleep(IDLE_POLL).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to pop notification, backing off");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Refresh the per-kind queue depth gauges on a fixed interval.
async fn report_queue_depth(state: AppState) {
    use models::job::JobKind;

    let mut interval = tokio::time::interval(Duration::from_secs(10));
    loop {
        interval.tick().await;
        for kind in [JobKind::Import, JobKind::Export] {
            match state.queue.queue_depth(kind).await {
                Ok(depth) => {
                    metrics::gauge!("queue_depth", "kind" => kind.to_string()).set(depth as f64);
                }
                Err(e) => {
                    tracing::debug!(kind = %kind, error = %e, "Failed to read queue depth");
                }
            }
        }
    }
}
