use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::services::{
    notifications::NotificationQueue, queue::JobQueue, registry::ConnectionRegistry,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<JobQueue>,
    pub notifications: Arc<NotificationQueue>,
    pub registry: Arc<ConnectionRegistry>,
    pub upload_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl AppState {
    pub fn new(
        db: PgPool,
        queue: JobQueue,
        notifications: NotificationQueue,
        upload_dir: impl Into<PathBuf>,
        export_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            queue: Arc::new(queue),
            notifications: Arc::new(notifications),
            registry: Arc::new(ConnectionRegistry::new()),
            upload_dir: upload_dir.into(),
            export_dir: export_dir.into(),
        }
    }
}
