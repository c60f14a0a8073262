use redis::AsyncCommands;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::db::job_queries;
use crate::models::job::{JobKind, JobLease, JobRecord};

/// Base delay before the first retry; doubles on each subsequent attempt.
pub const RETRY_BASE_DELAY_MS: u64 = 2000;

/// Maximum number of processing attempts before a job fails terminally.
pub const MAX_ATTEMPTS: i32 = 3;

fn ready_key(kind: JobKind) -> String {
    format!("vehicle_bulk:{}:jobs", kind)
}

fn processing_key(kind: JobKind) -> String {
    format!("vehicle_bulk:{}:processing", kind)
}

fn delayed_key(kind: JobKind) -> String {
    format!("vehicle_bulk:{}:delayed", kind)
}

/// Exponential backoff for a retry of the given attempt number (1-based).
pub fn retry_delay(attempt: i32) -> Duration {
    let exponent = attempt.saturating_sub(1).clamp(0, 16) as u32;
    Duration::from_millis(RETRY_BASE_DELAY_MS << exponent)
}

/// Redis-backed durable job queue.
///
/// The durable job record lives in Postgres; Redis lists only carry job ids:
/// a ready list per kind, a processing list (RPOPLPUSH target, so a job id is
/// never in limbo), and a sorted set of delayed retries keyed by ready time.
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Enqueue a job: record it durably, then make it visible to workers.
    ///
    /// Surfaces backend unavailability to the caller instead of dropping
    /// work; never blocks on job execution.
    pub async fn enqueue(
        &self,
        pool: &PgPool,
        kind: JobKind,
        payload: &serde_json::Value,
    ) -> Result<JobRecord, QueueError> {
        let job = job_queries::create_job(pool, kind, payload).await?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        conn.lpush::<_, _, ()>(ready_key(kind), job.id.to_string())
            .await
            .map_err(QueueError::Redis)?;

        Ok(job)
    }

    /// Dequeue the next job of a kind and take ownership of it.
    ///
    /// Returns `None` when the ready list is empty. A job id whose record is
    /// no longer `queued` (removed out-of-band or already terminal) is
    /// dropped from the processing list and skipped.
    pub async fn dequeue(
        &self,
        pool: &PgPool,
        kind: JobKind,
    ) -> Result<Option<JobLease>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let raw: Option<String> = conn
            .rpoplpush(ready_key(kind), processing_key(kind))
            .await
            .map_err(QueueError::Redis)?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let job_id: Uuid = raw.parse().map_err(|_| QueueError::MalformedEntry(raw.clone()))?;

        match job_queries::acquire_job(pool, job_id).await? {
            Some(lease) => Ok(Some(lease)),
            None => {
                tracing::warn!(%job_id, "Dequeued job is not in queued state, discarding");
                conn.lrem::<_, _, ()>(processing_key(kind), 1, &raw)
                    .await
                    .map_err(QueueError::Redis)?;
                Ok(None)
            }
        }
    }

    /// Remove a finished job from the processing list.
    pub async fn complete(&self, lease: &JobLease) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        conn.lrem::<_, _, ()>(processing_key(lease.kind), 1, lease.job_id.to_string())
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Park a job for a delayed retry attempt.
    pub async fn schedule_retry(
        &self,
        lease: &JobLease,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let ready_at = chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        conn.zadd::<_, _, _, ()>(delayed_key(lease.kind), lease.job_id.to_string(), ready_at)
            .await
            .map_err(QueueError::Redis)?;
        conn.lrem::<_, _, ()>(processing_key(lease.kind), 1, lease.job_id.to_string())
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Move delayed jobs whose backoff has elapsed back to the ready list.
    pub async fn promote_due(&self, kind: JobKind) -> Result<u64, QueueError> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let due: Vec<String> = conn
            .zrangebyscore(delayed_key(kind), 0, now)
            .await
            .map_err(QueueError::Redis)?;

        let mut promoted = 0;
        for job_id in due {
            let removed: i64 = conn
                .zrem(delayed_key(kind), &job_id)
                .await
                .map_err(QueueError::Redis)?;
            // Another worker may have promoted it between the read and the zrem.
            if removed > 0 {
                conn.lpush::<_, _, ()>(ready_key(kind), &job_id)
                    .await
                    .map_err(QueueError::Redis)?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Get the current queue depth (pending jobs of a kind).
    pub async fn queue_depth(&self, kind: JobKind) -> Result<u64, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let depth: u64 = conn
            .llen(ready_key(kind))
            .await
            .map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Malformed queue entry: {0}")]
    MalformedEntry(String),
}
