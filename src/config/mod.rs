use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for job and notification queues
    pub redis_url: String,

    /// Directory where uploaded spreadsheets are stored until imported
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Directory where export CSV files are written
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_upload_dir() -> String {
    "./uploads".to_string()
}

fn default_export_dir() -> String {
    "./exports".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
