//! Test helper utilities for E2E testing

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Response from POST /api/v1/upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub job_id: Uuid,
}

/// Response from POST /api/v1/export
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// Response from GET /api/v1/jobs/{job_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub kind: String,
    pub status: String,
    pub progress: i32,
    pub failure_reason: Option<String>,
    pub file_path: Option<String>,
}

/// Upload a spreadsheet to the import endpoint
pub async fn upload_spreadsheet(
    client: &reqwest::Client,
    base_url: &str,
    filename: &str,
    contents: Vec<u8>,
    user_id: Option<&str>,
) -> Result<UploadResponse, Box<dyn std::error::Error + Send + Sync>> {
    let mut form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(contents)
            .file_name(filename.to_string())
            .mime_str("text/csv")?,
    );

    if let Some(user) = user_id {
        form = form.text("user_id", user.to_string());
    }

    let response = client
        .post(format!("{}/api/v1/upload", base_url))
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Upload failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<UploadResponse>().await?)
}

/// Queue an export job with an optional age filter
pub async fn queue_export(
    client: &reqwest::Client,
    base_url: &str,
    age: Option<i32>,
    user_id: Option<&str>,
) -> Result<ExportResponse, Box<dyn std::error::Error + Send + Sync>> {
    let mut body = serde_json::Map::new();
    if let Some(age) = age {
        body.insert("age".to_string(), age.into());
    }
    if let Some(user) = user_id {
        body.insert("user_id".to_string(), user.to_string().into());
    }

    let response = client
        .post(format!("{}/api/v1/export", base_url))
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Export request failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<ExportResponse>().await?)
}

/// Poll job status until completed or failed (with timeout)
pub async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error + Send + Sync>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/api/v1/jobs/{}", base_url, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status_response = response.json::<JobStatusResponse>().await?;

        match status_response.status.as_str() {
            "completed" | "failed" => return Ok(status_response),
            "queued" | "processing" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!("  ... still waiting (attempt {}/{})", attempt, max_attempts);
                }
                sleep(Duration::from_millis(500)).await;
            }
            _ => {
                return Err(format!("Unknown job status: {}", status_response.status).into());
            }
        }
    }

    Err(format!("Job did not complete within {} seconds", timeout_secs).into())
}

/// Wait for the worker to process a job (with timeout)
pub async fn wait_for_job_completion(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
) -> Result<JobStatusResponse, Box<dyn std::error::Error + Send + Sync>> {
    poll_job_status(client, base_url, job_id, 60).await
}

/// Download a completed export and return the CSV body
pub async fn download_export(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let response = client
        .get(format!("{}/api/v1/export/{}/download", base_url, job_id))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Download failed with status {}: {}", status, error_text).into());
    }

    Ok(response.text().await?)
}
