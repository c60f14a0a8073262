//! Bulk Vehicle Import/Export Pipeline
//!
//! This library provides the core functionality for the vehicle-bulk system:
//! an asynchronous job pipeline that ingests vehicle records from uploaded
//! CSV/Excel files, produces on-demand CSV exports, and notifies the
//! triggering user over a live WebSocket connection.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
