use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use garde::Validate;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::job_queries;
use crate::models::api::{error_response, ErrorResponse, ExportRequest, ExportResponse};
use crate::models::job::{ExportPayload, JobKind, JobStatus};
use crate::services::exporter::ExportFileGuard;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// POST /api/v1/export — queue an export job for vehicles at most `age`
/// years old (all vehicles when no filter is given).
pub async fn queue_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;

    let payload = ExportPayload {
        age: request.age,
        user_id: request.user_id,
        ..Default::default()
    };
    let payload_json = serde_json::to_value(&payload)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let job = state
        .queue
        .enqueue(&state.db, JobKind::Export, &payload_json)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to enqueue export job");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Failed to queue export job: {e}"),
            )
        })?;

    metrics::counter!("export_jobs_submitted").increment(1);
    tracing::info!(job_id = %job.id, age = ?payload.age, "Export job queued");

    Ok(Json(ExportResponse {
        job_id: job.id,
        status: JobStatus::Queued,
        message: "Export job has been queued successfully".to_string(),
    }))
}

/// GET /api/v1/export/{job_id}/download — stream a completed export CSV.
///
/// The file is deleted on every exit path once this handler picks it up, so
/// a second download reports file-not-found rather than serving stale data.
pub async fn download_export(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = job_queries::get_job(&state.db, job_id)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Export job not found"))?;

    if job.kind != JobKind::Export {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Job is not an export job",
        ));
    }
    if job.status != JobStatus::Completed {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Export job is not completed yet",
        ));
    }

    let payload: ExportPayload = serde_json::from_value(job.payload)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let file_path = payload
        .file_path
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Export file not found"))?;

    // From here on the file is deleted no matter how we exit.
    let guard = ExportFileGuard::new(&file_path);

    let file = tokio::fs::File::open(guard.path()).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            error_response(StatusCode::NOT_FOUND, "Export file not found")
        } else {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to open export file: {e}"),
            )
        }
    })?;

    let file_name = guard
        .path()
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("export.csv")
        .to_string();
    // The open handle keeps the bytes readable after the unlink, so the
    // path can be removed before the stream finishes.
    drop(guard);

    tracing::info!(job_id = %job_id, file = %file_name, "Export file downloaded");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}
