//! Attachment upload/download/delete flows
//!
//! Uploads are validated (document mime types, size cap), written to disk
//! under a sanitized unique name, recorded in the file store, and then the
//! certificate is moved toward completion through the ordinary
//! `update_status` path. Completion is skipped when the certificate is
//! already issued (a corrected document just replaces the old one).

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{authorize, Action, Caller};
use crate::certificates::{CertificateStatus, LifecycleManager};
use crate::files::{CertificateFile, FileStore, NewCertificateFile};
use crate::types::{RegistrarError, Result};

/// Mime types accepted for certificate documents
const ALLOWED_MIME_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub struct AttachmentService {
    store: Arc<dyn FileStore>,
    lifecycle: Arc<LifecycleManager>,
    upload_dir: PathBuf,
    max_bytes: usize,
}

impl AttachmentService {
    pub fn new(
        store: Arc<dyn FileStore>,
        lifecycle: Arc<LifecycleManager>,
        upload_dir: impl Into<PathBuf>,
        max_bytes: usize,
    ) -> Self {
        Self {
            store,
            lifecycle,
            upload_dir: upload_dir.into(),
            max_bytes,
        }
    }

    /// Validate an upload before touching disk
    pub fn validate(&self, mime_type: &str, size_bytes: usize) -> Result<()> {
        if !ALLOWED_MIME_TYPES.contains(&mime_type) {
            return Err(RegistrarError::BadRequest(
                "Invalid file type. Only PDF and Word documents are allowed.".into(),
            ));
        }
        if size_bytes == 0 {
            return Err(RegistrarError::BadRequest("Empty file".into()));
        }
        if size_bytes > self.max_bytes {
            return Err(RegistrarError::BadRequest(format!(
                "File size exceeds maximum allowed size ({} bytes)",
                self.max_bytes
            )));
        }
        Ok(())
    }

    /// Attach a generated document to a certificate
    pub async fn upload(
        &self,
        caller: Caller,
        certificate_id: i64,
        file_name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> Result<CertificateFile> {
        authorize(caller, Action::UploadFile, None)?;
        self.validate(mime_type, data.len())?;

        // Certificate must exist; handlers pass the visibility rule for any row
        let certificate = self.lifecycle.get(caller, certificate_id).await?;
        if certificate.status == CertificateStatus::Rejected {
            return Err(RegistrarError::Conflict(
                "Cannot attach a document to a rejected certificate".into(),
            ));
        }

        let stored_name = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let stored_path = self.upload_dir.join(&stored_name);

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::write(&stored_path, &data).await?;

        let file = match self
            .store
            .insert(NewCertificateFile {
                certificate_id,
                file_name: file_name.to_string(),
                stored_path: stored_path.to_string_lossy().into_owned(),
                size_bytes: data.len() as u64,
                mime_type: mime_type.to_string(),
                uploaded_by: caller.id,
            })
            .await
        {
            Ok(file) => file,
            Err(e) => {
                if let Err(unlink_err) = tokio::fs::remove_file(&stored_path).await {
                    warn!(path = %stored_path.display(), error = %unlink_err, "Failed to remove orphaned upload");
                }
                return Err(e);
            }
        };

        // Record completion; an already-issued certificate keeps its
        // status and simply gains a newer document
        if certificate.status != CertificateStatus::Issued {
            self.lifecycle
                .update_status(caller, certificate_id, CertificateStatus::Issued, None)
                .await?;
        }

        info!(
            certificate_id,
            file_id = file.id,
            size = file.size_bytes,
            "Document attached"
        );

        Ok(file)
    }

    /// Fetch the latest document for a certificate, applying the
    /// certificate visibility rule to the caller
    pub async fn download(
        &self,
        caller: Caller,
        certificate_id: i64,
    ) -> Result<(CertificateFile, Vec<u8>)> {
        self.lifecycle.get(caller, certificate_id).await?;

        let file = self
            .store
            .find_by_certificate(certificate_id)
            .await?
            .ok_or_else(|| RegistrarError::NotFound("File not found".into()))?;

        let content = tokio::fs::read(&file.stored_path)
            .await
            .map_err(|e| RegistrarError::Internal(format!("Failed to read file: {}", e)))?;

        Ok((file, content))
    }

    /// Remove an attached document (admin or original uploader only)
    pub async fn delete(&self, caller: Caller, file_id: i64) -> Result<()> {
        let file = self
            .store
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| RegistrarError::NotFound("File not found".into()))?;

        authorize(caller, Action::DeleteFile, Some(file.uploaded_by))?;

        // A missing disk file should not block removing the row
        if let Err(e) = tokio::fs::remove_file(&file.stored_path).await {
            warn!(path = %file.stored_path, error = %e, "Failed to delete file from disk");
        }

        self.store.delete(file_id).await?;

        info!(file_id, certificate_id = file.certificate_id, "Document deleted");
        Ok(())
    }

    /// Latest file metadata without content, for embedding in responses
    pub async fn latest_for(&self, certificate_id: i64) -> Result<Option<CertificateFile>> {
        self.store.find_by_certificate(certificate_id).await
    }
}

/// Keep only filesystem-safe characters from a client-supplied name
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::certificates::{CertificateType, MemoryCertificateStore};
    use crate::files::MemoryFileStore;
    use crate::identity::{MemoryUserStore, NewUser, UserStore};

    struct Fixture {
        service: AttachmentService,
        lifecycle: Arc<LifecycleManager>,
        student: Caller,
        staff: Caller,
        other_staff: Caller,
        admin: Caller,
        _dir: tempfile::TempDir,
    }

    async fn seed(users: &MemoryUserStore, role: Role, email: &str) -> Caller {
        let user = users
            .insert(NewUser {
                email: email.into(),
                password_hash: "hash".into(),
                role,
                first_name: "Test".into(),
                last_name: "User".into(),
                middle_name: None,
                phone: None,
                profile: None,
            })
            .await
            .unwrap();
        Caller::new(user.id, role)
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserStore::new());
        let student = seed(&users, Role::Student, "anna@university.edu").await;
        let staff = seed(&users, Role::Staff, "clerk@university.edu").await;
        let other_staff = seed(&users, Role::Staff, "clerk2@university.edu").await;
        let admin = seed(&users, Role::Admin, "admin@university.edu").await;

        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::new(MemoryCertificateStore::new()),
            users,
        ));
        let dir = tempfile::tempdir().unwrap();
        let service = AttachmentService::new(
            Arc::new(MemoryFileStore::new()),
            Arc::clone(&lifecycle),
            dir.path(),
            10 * 1024 * 1024,
        );

        Fixture {
            service,
            lifecycle,
            student,
            staff,
            other_staff,
            admin,
            _dir: dir,
        }
    }

    async fn submitted(fx: &Fixture) -> i64 {
        fx.lifecycle
            .create(
                fx.student,
                CertificateType::Enrollment,
                serde_json::json!({}),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_upload_stores_and_issues() {
        let fx = fixture().await;
        let cert_id = submitted(&fx).await;

        let file = fx
            .service
            .upload(
                fx.staff,
                cert_id,
                "enrollment.pdf",
                "application/pdf",
                Bytes::from_static(b"%PDF-1.4 content"),
            )
            .await
            .unwrap();

        assert_eq!(file.certificate_id, cert_id);
        assert_eq!(file.uploaded_by, fx.staff.id);

        let cert = fx.lifecycle.get(fx.staff, cert_id).await.unwrap();
        assert_eq!(cert.status, CertificateStatus::Issued);
        assert!(cert.issued_at.is_some());

        // Student downloads their own document
        let (meta, content) = fx.service.download(fx.student, cert_id).await.unwrap();
        assert_eq!(meta.file_name, "enrollment.pdf");
        assert_eq!(content, b"%PDF-1.4 content");
    }

    #[tokio::test]
    async fn test_reupload_keeps_issued_and_latest_wins() {
        let fx = fixture().await;
        let cert_id = submitted(&fx).await;

        fx.service
            .upload(
                fx.staff,
                cert_id,
                "v1.pdf",
                "application/pdf",
                Bytes::from_static(b"first"),
            )
            .await
            .unwrap();
        fx.service
            .upload(
                fx.staff,
                cert_id,
                "v2.pdf",
                "application/pdf",
                Bytes::from_static(b"second"),
            )
            .await
            .unwrap();

        let (meta, content) = fx.service.download(fx.staff, cert_id).await.unwrap();
        assert_eq!(meta.file_name, "v2.pdf");
        assert_eq!(content, b"second");
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_uploads() {
        let fx = fixture().await;
        let cert_id = submitted(&fx).await;

        let err = fx
            .service
            .upload(
                fx.staff,
                cert_id,
                "photo.png",
                "image/png",
                Bytes::from_static(b"png"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrarError::BadRequest(_)));

        let small = AttachmentService::new(
            Arc::new(MemoryFileStore::new()),
            Arc::clone(&fx.lifecycle),
            fx._dir.path(),
            4,
        );
        let err = small
            .upload(
                fx.staff,
                cert_id,
                "big.pdf",
                "application/pdf",
                Bytes::from_static(b"too large"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrarError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_students_cannot_upload() {
        let fx = fixture().await;
        let cert_id = submitted(&fx).await;

        let err = fx
            .service
            .upload(
                fx.student,
                cert_id,
                "doc.pdf",
                "application/pdf",
                Bytes::from_static(b"pdf"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrarError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_no_upload_to_rejected_certificate() {
        let fx = fixture().await;
        let cert_id = submitted(&fx).await;
        fx.lifecycle
            .update_status(
                fx.staff,
                cert_id,
                CertificateStatus::Rejected,
                Some("Incomplete".into()),
            )
            .await
            .unwrap();

        let err = fx
            .service
            .upload(
                fx.staff,
                cert_id,
                "doc.pdf",
                "application/pdf",
                Bytes::from_static(b"pdf"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrarError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_is_admin_or_uploader() {
        let fx = fixture().await;
        let cert_id = submitted(&fx).await;

        let file = fx
            .service
            .upload(
                fx.staff,
                cert_id,
                "doc.pdf",
                "application/pdf",
                Bytes::from_static(b"pdf"),
            )
            .await
            .unwrap();

        // A different staff member may not delete it
        let err = fx.service.delete(fx.other_staff, file.id).await.unwrap_err();
        assert!(matches!(err, RegistrarError::Forbidden(_)));

        // The uploader may
        fx.service.delete(fx.staff, file.id).await.unwrap();
        assert!(fx.service.latest_for(cert_id).await.unwrap().is_none());

        // And the admin may delete someone else's upload
        let file = fx
            .service
            .upload(
                fx.staff,
                cert_id,
                "doc2.pdf",
                "application/pdf",
                Bytes::from_static(b"pdf"),
            )
            .await
            .unwrap();
        fx.service.delete(fx.admin, file.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_download_missing_file_is_not_found() {
        let fx = fixture().await;

        let cert_id = submitted(&fx).await;
        fx.service
            .upload(
                fx.staff,
                cert_id,
                "doc.pdf",
                "application/pdf",
                Bytes::from_static(b"pdf"),
            )
            .await
            .unwrap();

        // A certificate with no file
        let bare_id = submitted(&fx).await;
        let err = fx.service.download(fx.staff, bare_id).await.unwrap_err();
        assert!(matches!(err, RegistrarError::NotFound(_)));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("enrollment.pdf"), "enrollment.pdf");
        assert_eq!(sanitize_file_name("my report(final).pdf"), "my_report_final_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(""), "document");

        // Non-ASCII names degrade to placeholders but keep the extension
        let cleaned = sanitize_file_name("справка.pdf");
        assert!(cleaned.ends_with(".pdf"));
        assert!(cleaned
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
    }
}
