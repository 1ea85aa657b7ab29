//! Registrar - certificate request service
//!
//! Students submit requests for administrative certificates (enrollment,
//! academic standing, attendance, graduation), staff triage and fulfill
//! them with optional document attachments, and a messenger bot offers the
//! same lifecycle over a conversational channel.

pub mod auth;
pub mod bot;
pub mod certificates;
pub mod config;
pub mod db;
pub mod files;
pub mod identity;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{RegistrarError, Result};
