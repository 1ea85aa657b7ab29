//! Database schemas
//!
//! MongoDB document structures for users, certificates, and attached
//! files, with conversions to and from the domain types. Timestamps are
//! stored as BSON datetimes; JSON payloads as embedded BSON.

mod certificate;
mod certificate_file;
mod user;

pub use certificate::{CertificateDoc, CERTIFICATE_COLLECTION, CERTIFICATE_SEQUENCE};
pub use certificate_file::{CertificateFileDoc, FILE_COLLECTION, FILE_SEQUENCE};
pub use user::{UserDoc, USER_COLLECTION, USER_SEQUENCE};
