//! Shared types for the registrar service

pub mod error;

pub use error::{RegistrarError, Result};
