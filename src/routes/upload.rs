use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use std::path::Path;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::api::{error_response, ErrorResponse, UploadResponse};
use crate::models::job::{FileType, ImportPayload, JobKind};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// POST /api/v1/upload — upload a CSV/Excel file and queue an import job.
///
/// The file is stored under the upload directory with a unique name; the
/// import worker only reads it. Enqueue failure removes the stored file so
/// nothing leaks when the queue backend is down.
pub async fn upload_spreadsheet(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "File field has no file name"))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Failed to read file: {e}")))?;
                file = Some((name, data.to_vec()));
            }
            Some("user_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Failed to read user_id: {e}")))?;
                if !value.trim().is_empty() {
                    user_id = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let (file_name, data) = file
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "No file uploaded"))?;

    let extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let file_type = FileType::from_extension(&extension).ok_or_else(|| {
        error_response(
            StatusCode::BAD_REQUEST,
            "Only CSV and Excel files are allowed",
        )
    })?;

    tokio::fs::create_dir_all(&state.upload_dir).await.map_err(|e| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to prepare upload directory: {e}"),
        )
    })?;

    let stored_path = state
        .upload_dir
        .join(format!("upload-{}.{}", Uuid::new_v4(), extension));
    tokio::fs::write(&stored_path, &data).await.map_err(|e| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to store uploaded file: {e}"),
        )
    })?;

    let payload = ImportPayload {
        file_path: stored_path.to_string_lossy().into_owned(),
        file_type,
        user_id,
    };
    let payload_json = serde_json::to_value(&payload)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let job = match state
        .queue
        .enqueue(&state.db, JobKind::Import, &payload_json)
        .await
    {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(error = %e, file = %payload.file_path, "Failed to enqueue import job");
            // Queue backend down is fatal to this request; don't leak the file.
            let _ = tokio::fs::remove_file(&stored_path).await;
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Failed to queue import job: {e}"),
            ));
        }
    };

    metrics::counter!("import_jobs_submitted").increment(1);
    tracing::info!(
        job_id = %job.id,
        file_name = %file_name,
        file_type = %file_type,
        size = data.len(),
        "Import job queued"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded and import job started".to_string(),
        job_id: job.id,
        file_name,
        file_size: data.len(),
        file_type,
    }))
}
