use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::job_queries;
use crate::models::api::{error_response, ErrorResponse, JobStatusResponse};
use crate::models::job::{ExportPayload, JobKind, JobStatus};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// GET /api/v1/jobs/{job_id} — poll a job's current state.
///
/// A pure read with no side effects, safe to call repeatedly until the
/// status leaves {queued, processing}. The file path appears once a
/// completed export has recorded it in its payload.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = job_queries::get_job(&state.db, job_id)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Job not found"))?;

    let file_path = if job.kind == JobKind::Export && job.status == JobStatus::Completed {
        serde_json::from_value::<ExportPayload>(job.payload.clone())
            .ok()
            .and_then(|p| p.file_path)
    } else {
        None
    };

    Ok(Json(JobStatusResponse {
        job_id: job.id,
        kind: job.kind,
        status: job.status,
        progress: job.progress,
        failure_reason: job.failure_reason,
        file_path,
    }))
}
