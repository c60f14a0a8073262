use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::job::{JobKind, JobLease, JobRecord, JobStatus};

fn row_to_job(row: &PgRow) -> Result<JobRecord, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    Ok(JobRecord {
        id: row.try_get("id")?,
        kind: kind
            .parse::<JobKind>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        status: status
            .parse::<JobStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        progress: row.try_get("progress")?,
        attempts: row.try_get("attempts")?,
        failure_reason: row.try_get("failure_reason")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a new job record in `queued` state.
pub async fn create_job(
    pool: &PgPool,
    kind: JobKind,
    payload: &serde_json::Value,
) -> Result<JobRecord, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO jobs (kind, status, payload)
        VALUES ($1, 'queued', $2)
        RETURNING id, kind, status, progress, attempts, failure_reason, payload,
                  created_at, updated_at
        "#,
    )
    .bind(kind.to_string())
    .bind(payload)
    .fetch_one(pool)
    .await?;

    row_to_job(&row)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<JobRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, kind, status, progress, attempts, failure_reason, payload,
               created_at, updated_at
        FROM jobs
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// Take ownership of a queued job: mark it processing, bump the attempt
/// counter and stamp a fresh lease token. Returns `None` when the job is no
/// longer in `queued` state (already owned, terminal, or removed).
pub async fn acquire_job(pool: &PgPool, job_id: Uuid) -> Result<Option<JobLease>, sqlx::Error> {
    let token = Uuid::new_v4();
    let row = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'processing',
            attempts = attempts + 1,
            lease_token = $2,
            processing_started_at = COALESCE(processing_started_at, NOW()),
            updated_at = NOW()
        WHERE id = $1 AND status = 'queued'
        RETURNING kind, attempts
        "#,
    )
    .bind(job_id)
    .bind(token)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        let kind: String = r.try_get("kind")?;
        Ok(JobLease {
            job_id,
            kind: kind
                .parse::<JobKind>()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            token,
            attempt: r.try_get("attempts")?,
        })
    })
    .transpose()
}

/// Update the progress percentage of an owned job.
///
/// Every mutation below verifies the lease token; a stale token matches zero
/// rows and surfaces as `RowNotFound`.
pub async fn update_progress(
    pool: &PgPool,
    lease: &JobLease,
    progress: i32,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET progress = $3, updated_at = NOW()
        WHERE id = $1 AND lease_token = $2
        "#,
    )
    .bind(lease.job_id)
    .bind(lease.token)
    .bind(progress.clamp(0, 100))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Merge a sparse JSON patch into an owned job's payload.
pub async fn merge_payload(
    pool: &PgPool,
    lease: &JobLease,
    patch: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET payload = payload || $3, updated_at = NOW()
        WHERE id = $1 AND lease_token = $2
        "#,
    )
    .bind(lease.job_id)
    .bind(lease.token)
    .bind(patch)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Move an owned job to its `completed` terminal state.
pub async fn complete_job(pool: &PgPool, lease: &JobLease) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'completed',
            progress = 100,
            lease_token = NULL,
            processing_completed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND lease_token = $2
        "#,
    )
    .bind(lease.job_id)
    .bind(lease.token)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Move an owned job to its `failed` terminal state.
pub async fn fail_job(
    pool: &PgPool,
    lease: &JobLease,
    reason: &str,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'failed',
            failure_reason = $3,
            lease_token = NULL,
            processing_completed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND lease_token = $2
        "#,
    )
    .bind(lease.job_id)
    .bind(lease.token)
    .bind(reason)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Hand an owned job back to the queue for a later retry attempt.
pub async fn release_for_retry(pool: &PgPool, lease: &JobLease) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'queued', lease_token = NULL, updated_at = NOW()
        WHERE id = $1 AND lease_token = $2
        "#,
    )
    .bind(lease.job_id)
    .bind(lease.token)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}
