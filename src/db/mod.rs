//! Database layer for the registrar service
//!
//! Provides MongoDB storage for users, certificates, and attached files.

pub mod mongo;
pub mod schemas;

pub use mongo::MongoClient;
pub use schemas::{CertificateDoc, CertificateFileDoc, UserDoc};
