//! End-to-end tests against a running deployment
//!
//! These tests require:
//! 1. PostgreSQL database running (with migrations applied)
//! 2. Redis running
//! 3. API server running on configured port
//! 4. Worker process running
//!
//! Run with: cargo test --test e2e_test -- --ignored --nocapture
//!
//! Set API_BASE_URL to override default (http://localhost:3000)

mod fixtures;
mod helpers;

use helpers::*;

/// Get base URL from env or default to localhost
fn get_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[tokio::test]
#[ignore] // Requires running API server, worker, and all infrastructure
async fn test_e2e_health_check() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .expect("Health check failed");

    assert!(
        response.status().is_success(),
        "Health check returned non-success status: {}",
        response.status()
    );

    println!("✓ Health check passed");
}

#[tokio::test]
#[ignore] // Requires running API server, worker, and all infrastructure
async fn test_e2e_csv_import_flow() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    println!("Testing CSV import flow");

    // 1. Upload a CSV batch
    let upload = upload_spreadsheet(
        &client,
        &base_url,
        "vehicles.csv",
        fixtures::valid_csv(5).into_bytes(),
        Some("e2e-import-user"),
    )
    .await
    .expect("Failed to upload CSV");

    assert!(upload.success);
    println!("  ✓ Upload accepted, job_id: {}", upload.job_id);

    // 2. Poll until the worker finishes
    let job = wait_for_job_completion(&client, &base_url, upload.job_id)
        .await
        .expect("Failed to wait for job completion");

    assert_eq!(job.kind, "import");
    assert_eq!(job.status, "completed", "Import failed: {:?}", job.failure_reason);
    assert_eq!(job.progress, 100);
    println!("  ✓ Import job completed");
}

#[tokio::test]
#[ignore]
async fn test_e2e_import_with_invalid_rows_still_completes() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    println!("Testing import isolation of bad rows");

    let upload = upload_spreadsheet(
        &client,
        &base_url,
        "mixed.csv",
        fixtures::csv_with_bad_row().into_bytes(),
        Some("e2e-mixed-user"),
    )
    .await
    .expect("Failed to upload CSV");

    let job = wait_for_job_completion(&client, &base_url, upload.job_id)
        .await
        .expect("Failed to wait for job completion");

    // One unparseable row must not fail the whole batch
    assert_eq!(job.status, "completed", "Import failed: {:?}", job.failure_reason);
    println!("  ✓ Batch with a bad row still completed");
}

#[tokio::test]
#[ignore]
async fn test_e2e_unparseable_file_fails_after_retries() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    println!("Testing terminal failure of an unparseable upload");

    // Valid extension, garbage content: every parse attempt fails the same
    // way, so the job burns through its retries.
    let upload = upload_spreadsheet(
        &client,
        &base_url,
        "broken.xlsx",
        vec![0u8; 64],
        Some("e2e-retry-user"),
    )
    .await
    .expect("Failed to upload file");

    // Backoff between attempts is 2s then 4s; give the worker headroom.
    let job = poll_job_status(&client, &base_url, upload.job_id, 60)
        .await
        .expect("Failed to wait for terminal state");

    assert_eq!(job.status, "failed");
    let reason = job.failure_reason.expect("Failed job has no reason");
    assert!(
        reason.contains("after 3 attempts"),
        "Unexpected failure reason: {reason}"
    );
    println!("  ✓ Job failed terminally after retries: {reason}");
}

#[tokio::test]
#[ignore]
async fn test_e2e_export_flow() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    println!("Testing export flow");

    // Seed some data so the export has something to write
    let upload = upload_spreadsheet(
        &client,
        &base_url,
        "seed.csv",
        fixtures::valid_csv(3).into_bytes(),
        None,
    )
    .await
    .expect("Failed to seed vehicles");
    wait_for_job_completion(&client, &base_url, upload.job_id)
        .await
        .expect("Seed import did not complete");

    // 1. Queue the export (no age filter: everything)
    let export = queue_export(&client, &base_url, None, Some("e2e-export-user"))
        .await
        .expect("Failed to queue export");

    assert_eq!(export.status, "queued");
    println!("  ✓ Export queued, job_id: {}", export.job_id);

    // 2. Wait for the worker
    let job = wait_for_job_completion(&client, &base_url, export.job_id)
        .await
        .expect("Failed to wait for export");

    assert_eq!(job.kind, "export");
    assert_eq!(job.status, "completed", "Export failed: {:?}", job.failure_reason);
    assert!(job.file_path.is_some(), "Completed export has no file path");

    // 3. Download; the file is deleted server-side after this response
    let body = download_export(&client, &base_url, export.job_id)
        .await
        .expect("Failed to download export");

    let mut lines = body.lines();
    assert_eq!(
        lines.next().unwrap(),
        "ID,First Name,Last Name,Email,Car Make,Car Model,VIN,Manufactured Date,Age of Vehicle"
    );
    assert!(lines.count() >= 3, "Export should contain the seeded rows");
    println!("  ✓ Export downloaded");

    // 4. A second download must 404: one-shot delivery
    let second = download_export(&client, &base_url, export.job_id).await;
    assert!(second.is_err(), "Second download should fail after cleanup");
    println!("  ✓ Export file removed after first download");
}

#[tokio::test]
#[ignore]
async fn test_e2e_export_with_no_matches_completes() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    println!("Testing empty export result");

    // Age 0 matches only vehicles manufactured this year
    let export = queue_export(&client, &base_url, Some(0), None)
        .await
        .expect("Failed to queue export");

    let job = wait_for_job_completion(&client, &base_url, export.job_id)
        .await
        .expect("Failed to wait for export");

    // Zero records is a success, not a failure; there is just no file
    assert_eq!(job.status, "completed", "Empty export failed: {:?}", job.failure_reason);
    println!("  ✓ Zero-match export completed without a file");
}

#[tokio::test]
#[ignore]
async fn test_e2e_rejects_unsupported_file_type() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    println!("Testing unsupported file rejection");

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"not a spreadsheet".to_vec())
            .file_name("report.pdf")
            .mime_str("application/pdf")
            .unwrap(),
    );

    let response = client
        .post(format!("{}/api/v1/upload", base_url))
        .multipart(form)
        .send()
        .await
        .expect("Request failed");

    assert!(
        response.status().is_client_error(),
        "Should reject unsupported file type, got status: {}",
        response.status()
    );

    println!("  ✓ Unsupported file properly rejected with status: {}", response.status());
}

#[tokio::test]
#[ignore]
async fn test_e2e_invalid_age_filter_rejected() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/export", base_url))
        .json(&serde_json::json!({ "age": -3 }))
        .send()
        .await
        .expect("Request failed");

    assert!(
        response.status().is_client_error(),
        "Negative age filter should be rejected, got status: {}",
        response.status()
    );

    println!("  ✓ Invalid age filter rejected");
}

#[tokio::test]
#[ignore]
async fn test_e2e_unknown_job_returns_404() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/v1/jobs/{}", base_url, uuid::Uuid::new_v4()))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    println!("  ✓ Unknown job id returns 404");
}

#[tokio::test]
#[ignore]
async fn test_e2e_concurrent_uploads() {
    let base_url = get_base_url();

    println!("Testing 3 concurrent uploads");

    let mut tasks = Vec::new();
    for i in 0..3 {
        let base_url = base_url.clone();
        let task = tokio::spawn(async move {
            let client = reqwest::Client::new();

            let upload = upload_spreadsheet(
                &client,
                &base_url,
                &format!("batch{i}.csv"),
                fixtures::valid_csv(2).into_bytes(),
                Some(&format!("concurrent-user-{i}")),
            )
            .await?;

            let job = wait_for_job_completion(&client, &base_url, upload.job_id).await?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>((i, job))
        });
        tasks.push(task);
    }

    let results = futures::future::join_all(tasks).await;

    let mut completed = 0;
    for result in results {
        match result {
            Ok(Ok((i, job))) => {
                println!("  ✓ Batch {} finished with status: {}", i, job.status);
                if job.status == "completed" {
                    completed += 1;
                }
            }
            Ok(Err(e)) => println!("  ✗ Upload/processing error: {}", e),
            Err(e) => println!("  ✗ Task error: {}", e),
        }
    }

    assert_eq!(completed, 3, "All concurrent imports should complete");
    println!("\n  ✓ Successfully processed {} concurrent uploads", completed);
}
