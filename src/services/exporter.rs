use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::vehicle::Vehicle;

/// Fixed, ordered header set of every export CSV.
pub const EXPORT_HEADERS: [&str; 9] = [
    "ID",
    "First Name",
    "Last Name",
    "Email",
    "Car Make",
    "Car Model",
    "VIN",
    "Manufactured Date",
    "Age of Vehicle",
];

/// Build the output path for an export job. The job id plus a timestamp
/// keeps concurrent exports for different users collision-free.
pub fn export_file_path(export_dir: &Path, job_id: Uuid) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S");
    export_dir.join(format!("vehicles_export_{job_id}_{timestamp}.csv"))
}

/// Write vehicles to a deterministic CSV file.
pub fn write_csv(path: &Path, vehicles: &[Vehicle]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(EXPORT_HEADERS)?;

    for vehicle in vehicles {
        writer.write_record([
            vehicle.id.to_string(),
            vehicle.first_name.clone(),
            vehicle.last_name.clone(),
            vehicle.email.clone(),
            vehicle.car_make.clone(),
            vehicle.car_model.clone(),
            vehicle.vin.clone(),
            vehicle.manufactured_date.format("%Y-%m-%d").to_string(),
            vehicle.age_of_vehicle.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Deletes the wrapped file when dropped, on every exit path.
///
/// The download handler holds one of these until it has an open handle on
/// the file, then drops it; the unlinked path means a job never leaves an
/// orphan export file behind, whether the stream succeeds or not.
pub struct ExportFileGuard {
    path: PathBuf,
}

impl ExportFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExportFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to delete export file");
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_vehicle() -> Vehicle {
        Vehicle {
            id: Uuid::new_v4(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            car_make: "Honda".to_string(),
            car_model: "Civic".to_string(),
            vin: "2HGFB2F50DH500001".to_string(),
            manufactured_date: NaiveDate::from_ymd_opt(2019, 4, 12).unwrap(),
            age_of_vehicle: 7,
        }
    }

    #[test]
    fn test_file_path_embeds_job_id() {
        let job_id = Uuid::new_v4();
        let path = export_file_path(Path::new("/tmp/exports"), job_id);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("vehicles_export_"));
        assert!(name.contains(&job_id.to_string()));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_concurrent_jobs_get_distinct_paths() {
        let dir = Path::new("/tmp/exports");
        let a = export_file_path(dir, Uuid::new_v4());
        let b = export_file_path(dir, Uuid::new_v4());
        assert_ne!(a, b);
    }

    #[test]
    fn test_write_csv_deterministic_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let vehicle = sample_vehicle();
        write_csv(&path, std::slice::from_ref(&vehicle)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,First Name,Last Name,Email,Car Make,Car Model,VIN,Manufactured Date,Age of Vehicle"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("Grace"));
        assert!(row.contains("2019-04-12"));
        assert!(row.ends_with(",7"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_csv_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        write_csv(&path, &[sample_vehicle()]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_guard_deletes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&path, &[sample_vehicle()]).unwrap();

        {
            let _guard = ExportFileGuard::new(&path);
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_guard_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = ExportFileGuard::new(dir.path().join("never-created.csv"));
        // Drop must not panic.
    }
}
