use serde_json::json;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use vehicle_bulk::{
    config::AppConfig,
    db::{self, job_queries, vehicle_queries},
    models::job::{ExportPayload, ImportPayload, JobKind, JobLease},
    models::notification::{NotificationEnvelope, NotificationKind, NotificationStatus},
    services::{
        exporter, importer,
        notifications::NotificationQueue,
        queue::{retry_delay, JobQueue, MAX_ATTEMPTS},
    },
};

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

type WorkerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone)]
struct WorkerContext {
    db: PgPool,
    queue: Arc<JobQueue>,
    notifications: Arc<NotificationQueue>,
    export_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting vehicle-bulk worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize queues
    tracing::info!("Connecting to Redis");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");
    let notifications = NotificationQueue::new(&config.redis_url)
        .expect("Failed to initialize notification queue");

    let ctx = WorkerContext {
        db: db_pool,
        queue: Arc::new(queue),
        notifications: Arc::new(notifications),
        export_dir: PathBuf::from(&config.export_dir),
    };

    tracing::info!("Worker ready, starting job processing loops");

    let import_loop = tokio::spawn(run_worker_loop(ctx.clone(), JobKind::Import));
    let export_loop = tokio::spawn(run_worker_loop(ctx, JobKind::Export));

    let _ = tokio::try_join!(import_loop, export_loop);
}

/// Poll one job kind forever: promote due retries, then process the next
/// ready job if any.
async fn run_worker_loop(ctx: WorkerContext, kind: JobKind) {
    loop {
        if let Err(e) = ctx.queue.promote_due(kind).await {
            tracing::error!(kind = %kind, error = %e, "Failed to promote delayed jobs");
        }

        match process_next_job(&ctx, kind).await {
            Ok(true) => {
                tracing::debug!(kind = %kind, "Job processed, checking for next job");
            }
            Ok(false) => {
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Error processing job, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Process the next job from the queue.
/// Returns Ok(true) if a job was processed, Ok(false) if no job available.
async fn process_next_job(ctx: &WorkerContext, kind: JobKind) -> Result<bool, WorkerError> {
    let lease = match ctx.queue.dequeue(&ctx.db, kind).await? {
        Some(lease) => lease,
        None => return Ok(false),
    };

    tracing::info!(
        job_id = %lease.job_id,
        kind = %kind,
        attempt = lease.attempt,
        "Processing job"
    );

    let started = std::time::Instant::now();
    let result = match kind {
        JobKind::Import => process_import(ctx, &lease).await,
        JobKind::Export => process_export(ctx, &lease).await,
    };
    metrics::histogram!("job_processing_seconds").record(started.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            metrics::counter!("jobs_completed").increment(1);
            ctx.queue.complete(&lease).await?;
            tracing::info!(job_id = %lease.job_id, "Job completed");
            Ok(true)
        }
        Err(e) if is_lost_lease(&e) => {
            // Another owner has the job now; leave its record alone.
            tracing::warn!(job_id = %lease.job_id, "Lease lost mid-job, abandoning");
            ctx.queue.complete(&lease).await?;
            Ok(true)
        }
        Err(e) => {
            tracing::error!(job_id = %lease.job_id, error = %e, "Job processing failed");

            if lease.attempt >= MAX_ATTEMPTS {
                let reason =
                    format!("Processing failed after {} attempts: {}", MAX_ATTEMPTS, e);
                job_queries::fail_job(&ctx.db, &lease, &reason).await?;
                ctx.queue.complete(&lease).await?;
                metrics::counter!("jobs_failed").increment(1);

                tracing::warn!(
                    job_id = %lease.job_id,
                    attempts = lease.attempt,
                    "Job failed after max attempts"
                );
            } else {
                let delay = retry_delay(lease.attempt);
                job_queries::release_for_retry(&ctx.db, &lease).await?;
                ctx.queue.schedule_retry(&lease, delay).await?;

                tracing::info!(
                    job_id = %lease.job_id,
                    attempt = lease.attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Job re-queued for retry"
                );
            }

            Ok(true)
        }
    }
}

fn is_lost_lease(e: &WorkerError) -> bool {
    matches!(e.downcast_ref::<sqlx::Error>(), Some(sqlx::Error::RowNotFound))
}

async fn notify(
    ctx: &WorkerContext,
    kind: NotificationKind,
    status: NotificationStatus,
    message: String,
    user_id: Option<String>,
    data: Option<serde_json::Value>,
) -> Result<(), WorkerError> {
    let mut envelope = NotificationEnvelope::new(kind, status, message, user_id);
    if let Some(data) = data {
        envelope = envelope.with_data(data);
    }
    ctx.notifications.push(&envelope).await?;
    Ok(())
}

/// Import pipeline: parse -> validate per row -> bulk persist -> notify.
///
/// One malformed row never sinks the batch; it is recorded with its 1-based
/// index and reported in a `failed` notification that can accompany the
/// `completed` one for the same job.
async fn process_import(ctx: &WorkerContext, lease: &JobLease) -> Result<(), WorkerError> {
    let job = job_queries::get_job(&ctx.db, lease.job_id)
        .await?
        .ok_or("job record vanished")?;
    let payload: ImportPayload = serde_json::from_value(job.payload)?;
    let user_id = payload.user_id.clone();

    notify(
        ctx,
        NotificationKind::Import,
        NotificationStatus::Started,
        format!("Import job started for file: {}", payload.file_path),
        user_id.clone(),
        None,
    )
    .await?;

    let inner = async {
        let path = PathBuf::from(&payload.file_path);
        let rows = importer::parse_file(&path, payload.file_type)?;
        job_queries::update_progress(&ctx.db, lease, 25).await?;

        let batch = importer::collect_vehicles(&rows);
        job_queries::update_progress(&ctx.db, lease, 50).await?;

        // All valid rows go to the store in one bulk call, only after the
        // whole file has been validated.
        if !batch.vehicles.is_empty() {
            vehicle_queries::bulk_insert(&ctx.db, &batch.vehicles).await?;
            metrics::counter!("vehicles_imported").increment(batch.vehicles.len() as u64);
            tracing::info!(
                job_id = %lease.job_id,
                imported = batch.vehicles.len(),
                errors = batch.errors.len(),
                "Vehicles imported"
            );

            notify(
                ctx,
                NotificationKind::Import,
                NotificationStatus::Completed,
                format!("Import completed for file: {}", payload.file_path),
                user_id.clone(),
                Some(json!({
                    "imported": batch.vehicles.len(),
                    "errors": batch.errors.len(),
                })),
            )
            .await?;
        }
        job_queries::update_progress(&ctx.db, lease, 90).await?;

        // A batch with both valid and invalid rows gets both notifications.
        if !batch.errors.is_empty() {
            tracing::warn!(
                job_id = %lease.job_id,
                errors = batch.errors.len(),
                "Import completed with row errors"
            );

            notify(
                ctx,
                NotificationKind::Import,
                NotificationStatus::Failed,
                format!(
                    "Import completed with {} errors for file: {}",
                    batch.errors.len(),
                    payload.file_path
                ),
                user_id.clone(),
                Some(json!({
                    "imported": batch.vehicles.len(),
                    "errors": batch.errors.len(),
                    "details": batch.errors,
                })),
            )
            .await?;
        }

        job_queries::complete_job(&ctx.db, lease).await?;
        Ok::<(), WorkerError>(())
    };

    match inner.await {
        Ok(()) => Ok(()),
        Err(e) if is_lost_lease(&e) => Err(e),
        Err(e) => {
            notify(
                ctx,
                NotificationKind::Import,
                NotificationStatus::Failed,
                format!(
                    "Import job failed for file: {} - {}",
                    payload.file_path, e
                ),
                user_id,
                Some(json!({ "error": e.to_string() })),
            )
            .await?;
            Err(e)
        }
    }
}

/// Export pipeline: filtered query -> CSV serialize -> record file path.
async fn process_export(ctx: &WorkerContext, lease: &JobLease) -> Result<(), WorkerError> {
    let job = job_queries::get_job(&ctx.db, lease.job_id)
        .await?
        .ok_or("job record vanished")?;
    let payload: ExportPayload = serde_json::from_value(job.payload)?;
    let user_id = payload.user_id.clone();

    let age_label = payload
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "any".to_string());

    notify(
        ctx,
        NotificationKind::Export,
        NotificationStatus::Started,
        format!("Export job started for vehicles with age: {age_label}"),
        user_id.clone(),
        None,
    )
    .await?;

    let inner = async {
        let vehicles = vehicle_queries::find_by_max_age(&ctx.db, payload.age).await?;
        job_queries::update_progress(&ctx.db, lease, 50).await?;

        // Zero matches is success: no file, completed with a zero count.
        if vehicles.is_empty() {
            tracing::info!(job_id = %lease.job_id, "No vehicles matched the export criteria");
            notify(
                ctx,
                NotificationKind::Export,
                NotificationStatus::Completed,
                "Export job completed: no vehicles found for the specified age criteria"
                    .to_string(),
                user_id.clone(),
                Some(json!({ "job_id": lease.job_id, "record_count": 0 })),
            )
            .await?;
            job_queries::complete_job(&ctx.db, lease).await?;
            return Ok::<(), WorkerError>(());
        }

        let path = exporter::export_file_path(&ctx.export_dir, lease.job_id);
        exporter::write_csv(&path, &vehicles)?;

        let file_path = path.to_string_lossy().into_owned();
        let patch = serde_json::to_value(ExportPayload {
            file_path: Some(file_path.clone()),
            record_count: Some(vehicles.len() as i64),
            ..Default::default()
        })?;
        job_queries::merge_payload(&ctx.db, lease, &patch).await?;

        tracing::info!(
            job_id = %lease.job_id,
            records = vehicles.len(),
            file = %file_path,
            "Export file written"
        );

        notify(
            ctx,
            NotificationKind::Export,
            NotificationStatus::Completed,
            format!("Export completed successfully for {} records", vehicles.len()),
            user_id.clone(),
            Some(json!({
                "job_id": lease.job_id,
                "file_path": file_path,
                "record_count": vehicles.len(),
            })),
        )
        .await?;

        job_queries::complete_job(&ctx.db, lease).await?;
        Ok::<(), WorkerError>(())
    };

    match inner.await {
        Ok(()) => Ok(()),
        Err(e) if is_lost_lease(&e) => Err(e),
        Err(e) => {
            // Record the error in the payload so the status endpoint can
            // surface it alongside the queue's failure reason.
            let patch = json!({ "error": e.to_string() });
            if let Err(patch_err) = job_queries::merge_payload(&ctx.db, lease, &patch).await {
                tracing::warn!(job_id = %lease.job_id, error = %patch_err, "Failed to record export error");
            }

            notify(
                ctx,
                NotificationKind::Export,
                NotificationStatus::Failed,
                format!("Export job failed: {e}"),
                user_id,
                Some(json!({ "job_id": lease.job_id, "error": e.to_string() })),
            )
            .await?;
            Err(e)
        }
    }
}
