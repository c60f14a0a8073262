use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{FileType, JobKind, JobStatus};

/// Response after uploading a spreadsheet and starting an import job.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub job_id: Uuid,
    pub file_name: String,
    pub file_size: usize,
    pub file_type: FileType,
}

/// Request to queue an export job.
#[derive(Debug, Deserialize, Validate)]
pub struct ExportRequest {
    /// Only vehicles this many years old or newer are exported.
    #[garde(range(min = 0, max = 100))]
    pub age: Option<i32>,

    #[garde(length(min = 1, max = 100))]
    pub user_id: Option<String>,
}

/// Response after queueing an export job.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Response for polling a job's current state.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Manual notification injection (connectivity test hook).
#[derive(Debug, Deserialize, Validate)]
pub struct NotifyRequest {
    #[garde(length(min = 1, max = 500))]
    pub message: String,

    #[garde(length(min = 1, max = 100))]
    pub user_id: Option<String>,
}

/// Uniform error body for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}
