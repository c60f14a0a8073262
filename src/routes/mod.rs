pub mod export;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod notify;
pub mod upload;
pub mod ws;
