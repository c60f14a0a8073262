pub mod api;
pub mod job;
pub mod notification;
pub mod vehicle;
