//! File Attachment Service
//!
//! Stores generated certificate documents on disk with their metadata in
//! the file store. A certificate may accumulate several files (each upload
//! of a corrected document adds a row); the contract is that the latest
//! upload wins — `find_by_certificate` returns only the most recent row.

pub mod mongo;
pub mod service;

pub use mongo::MongoFileStore;
pub use service::AttachmentService;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::types::Result;

/// Metadata for a document attached to a certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateFile {
    pub id: i64,
    pub certificate_id: i64,
    /// Name the uploader gave the file
    pub file_name: String,
    /// Location on disk; not exposed to clients
    #[serde(skip_serializing, default)]
    pub stored_path: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub uploaded_by: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Fields for recording a new upload
#[derive(Debug, Clone)]
pub struct NewCertificateFile {
    pub certificate_id: i64,
    pub file_name: String,
    pub stored_path: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub uploaded_by: i64,
}

/// Persistence contract for attachment metadata
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn insert(&self, new: NewCertificateFile) -> Result<CertificateFile>;

    async fn get_by_id(&self, id: i64) -> Result<Option<CertificateFile>>;

    /// The most recent file for a certificate (latest wins)
    async fn find_by_certificate(&self, certificate_id: i64) -> Result<Option<CertificateFile>>;

    /// Remove a metadata row; returns whether it existed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// In-memory file store for dev mode and tests
pub struct MemoryFileStore {
    rows: Mutex<Vec<CertificateFile>>,
    next_id: AtomicI64,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CertificateFile>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn insert(&self, new: NewCertificateFile) -> Result<CertificateFile> {
        let file = CertificateFile {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            certificate_id: new.certificate_id,
            file_name: new.file_name,
            stored_path: new.stored_path,
            size_bytes: new.size_bytes,
            mime_type: new.mime_type,
            uploaded_by: new.uploaded_by,
            uploaded_at: Utc::now(),
        };
        self.lock().push(file.clone());
        Ok(file)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CertificateFile>> {
        Ok(self.lock().iter().find(|f| f.id == id).cloned())
    }

    async fn find_by_certificate(&self, certificate_id: i64) -> Result<Option<CertificateFile>> {
        Ok(self
            .lock()
            .iter()
            .filter(|f| f.certificate_id == certificate_id)
            .max_by_key(|f| (f.uploaded_at, f.id))
            .cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|f| f.id != id);
        Ok(rows.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(certificate_id: i64, name: &str) -> NewCertificateFile {
        NewCertificateFile {
            certificate_id,
            file_name: name.into(),
            stored_path: format!("/tmp/{}", name),
            size_bytes: 1024,
            mime_type: "application/pdf".into(),
            uploaded_by: 3,
        }
    }

    #[tokio::test]
    async fn test_latest_file_wins() {
        let store = MemoryFileStore::new();
        store.insert(upload(5, "first.pdf")).await.unwrap();
        let second = store.insert(upload(5, "second.pdf")).await.unwrap();

        let latest = store.find_by_certificate(5).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.file_name, "second.pdf");

        assert!(store.find_by_certificate(6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryFileStore::new();
        let file = store.insert(upload(5, "doc.pdf")).await.unwrap();

        assert!(store.delete(file.id).await.unwrap());
        assert!(!store.delete(file.id).await.unwrap());
        assert!(store.get_by_id(file.id).await.unwrap().is_none());
    }

    #[test]
    fn test_stored_path_is_not_serialized() {
        let file = CertificateFile {
            id: 1,
            certificate_id: 5,
            file_name: "doc.pdf".into(),
            stored_path: "/var/uploads/secret-location.pdf".into(),
            size_bytes: 1024,
            mime_type: "application/pdf".into(),
            uploaded_by: 3,
            uploaded_at: Utc::now(),
        };
        let json = serde_json::to_string(&file).unwrap();
        assert!(!json.contains("secret-location"));
    }
}
