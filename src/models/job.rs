use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a job in the async queue.
///
/// Transitions are monotonic along queued -> processing -> {completed, failed}.
/// A job re-enters processing only through the queue's retry scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// The two kinds of queued work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    Import,
    Export,
}

/// Spreadsheet format of an uploaded file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileType {
    Csv,
    Excel,
}

impl FileType {
    /// Map a file extension (lowercase, without dot) to a supported type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "csv" => Some(FileType::Csv),
            "xls" | "xlsx" => Some(FileType::Excel),
            _ => None,
        }
    }
}

/// A durable job record as stored in Postgres.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: i32,
    pub attempts: i32,
    pub failure_reason: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Proof that a worker currently owns a job.
///
/// Issued at dequeue time; every job mutation verifies the token so a worker
/// can never touch a job it no longer owns.
#[derive(Debug, Clone)]
pub struct JobLease {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub token: Uuid,
    /// Attempt number this lease was issued for (1-based).
    pub attempt: i32,
}

/// Payload of an import job: the stored upload and who triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPayload {
    pub file_path: String,
    pub file_type: FileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Payload of an export job. The worker merges `file_path` and
/// `record_count` back into its own job's payload once the CSV is written;
/// the download path reads them from there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
