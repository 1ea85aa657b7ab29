//! Certificate persistence contract and the in-memory implementation
//!
//! The store is the single source of truth for certificate state: the
//! lifecycle manager never caches rows, and every single-certificate
//! mutation goes through `conditional_update`, a compare-and-set keyed on
//! the expected prior status. Two concurrent mutations of the same row can
//! therefore never both apply; the loser observes `Conflict`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::certificates::{
    Certificate, CertificatePatch, CertificateStatus, NewCertificate, StatusCounts,
};
use crate::types::{RegistrarError, Result};

/// Persistent Store collaborator for certificate rows
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Insert a new certificate with status `pending` and no handler
    async fn insert(&self, new: NewCertificate) -> Result<Certificate>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Certificate>>;

    /// Atomically apply `patch` iff the row's current status equals
    /// `expected`. Fails with `NotFound` if the row is absent and
    /// `Conflict` if the status no longer matches.
    async fn conditional_update(
        &self,
        id: i64,
        expected: CertificateStatus,
        patch: CertificatePatch,
    ) -> Result<Certificate>;

    /// A student's certificates, newest first
    async fn list_by_student(
        &self,
        student_id: i64,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>>;

    /// Certificates in a given status, newest first
    async fn list_by_status(
        &self,
        status: CertificateStatus,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>>;

    /// Every certificate, newest first
    async fn list_all(&self, limit: i64, offset: u64) -> Result<Vec<Certificate>>;

    /// Per-status counts
    async fn aggregate_counts(&self) -> Result<StatusCounts>;
}

/// In-memory certificate store.
///
/// Serves dev mode (running without MongoDB) and the test suite. The map
/// mutex makes `conditional_update` a true compare-and-set: the status
/// check and the write happen under one lock.
pub struct MemoryCertificateStore {
    rows: Mutex<HashMap<i64, Certificate>>,
    next_id: AtomicI64,
}

impl MemoryCertificateStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Certificate>> {
        // Lock poisoning only happens if a holder panicked; propagating the
        // inner data is still sound for this store
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn paged(mut rows: Vec<Certificate>, limit: i64, offset: u64) -> Vec<Certificate> {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.into_iter()
            .skip(offset as usize)
            .take(limit.max(0) as usize)
            .collect()
    }
}

impl Default for MemoryCertificateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CertificateStore for MemoryCertificateStore {
    async fn insert(&self, new: NewCertificate) -> Result<Certificate> {
        let now = Utc::now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let certificate = Certificate {
            id,
            student_id: new.student_id,
            staff_id: None,
            kind: new.kind,
            status: CertificateStatus::Pending,
            request_data: new.request_data,
            rejection_reason: None,
            issued_at: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().insert(id, certificate.clone());
        Ok(certificate)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Certificate>> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn conditional_update(
        &self,
        id: i64,
        expected: CertificateStatus,
        patch: CertificatePatch,
    ) -> Result<Certificate> {
        let mut rows = self.lock();
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| RegistrarError::NotFound(format!("Certificate {} not found", id)))?;

        if row.status != expected {
            return Err(RegistrarError::Conflict(format!(
                "Certificate {} is no longer {}",
                id, expected
            )));
        }

        row.status = patch.status;
        if let Some(staff_id) = patch.staff_id {
            row.staff_id = Some(staff_id);
        }
        row.rejection_reason = patch.rejection_reason;
        row.issued_at = patch.issued_at;
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn list_by_student(
        &self,
        student_id: i64,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>> {
        let rows = self
            .lock()
            .values()
            .filter(|c| c.student_id == student_id)
            .cloned()
            .collect();
        Ok(Self::paged(rows, limit, offset))
    }

    async fn list_by_status(
        &self,
        status: CertificateStatus,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>> {
        let rows = self
            .lock()
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect();
        Ok(Self::paged(rows, limit, offset))
    }

    async fn list_all(&self, limit: i64, offset: u64) -> Result<Vec<Certificate>> {
        let rows = self.lock().values().cloned().collect();
        Ok(Self::paged(rows, limit, offset))
    }

    async fn aggregate_counts(&self) -> Result<StatusCounts> {
        let mut counts = StatusCounts::default();
        for row in self.lock().values() {
            counts.record(row.status);
        }
        Ok(counts)
    }
}
