pub mod exporter;
pub mod importer;
pub mod notifications;
pub mod queue;
pub mod registry;
