//! Certificate file document schema

use serde::{Deserialize, Serialize};

use crate::files::CertificateFile;

pub const FILE_COLLECTION: &str = "certificate_files";
pub const FILE_SEQUENCE: &str = "certificate_file_id";

/// MongoDB document for an attached certificate document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateFileDoc {
    #[serde(rename = "_id")]
    pub id: i64,
    pub certificate_id: i64,
    pub file_name: String,
    pub stored_path: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub uploaded_by: i64,
    pub uploaded_at: bson::DateTime,
}

impl From<CertificateFile> for CertificateFileDoc {
    fn from(file: CertificateFile) -> Self {
        Self {
            id: file.id,
            certificate_id: file.certificate_id,
            file_name: file.file_name,
            stored_path: file.stored_path,
            size_bytes: file.size_bytes as i64,
            mime_type: file.mime_type,
            uploaded_by: file.uploaded_by,
            uploaded_at: bson::DateTime::from_chrono(file.uploaded_at),
        }
    }
}

impl From<CertificateFileDoc> for CertificateFile {
    fn from(doc: CertificateFileDoc) -> Self {
        Self {
            id: doc.id,
            certificate_id: doc.certificate_id,
            file_name: doc.file_name,
            stored_path: doc.stored_path,
            size_bytes: doc.size_bytes.max(0) as u64,
            mime_type: doc.mime_type,
            uploaded_by: doc.uploaded_by,
            uploaded_at: doc.uploaded_at.to_chrono(),
        }
    }
}
