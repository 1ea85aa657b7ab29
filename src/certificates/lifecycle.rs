//! Certificate lifecycle manager
//!
//! Owns creation, staff assignment, status transitions, and the
//! read-visibility rule. Every operation authorizes the caller through the
//! capability policy, resolves identities through the Identity Provider,
//! and mutates rows only through the store's conditional update, so a
//! failed operation leaves prior state untouched.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::auth::{authorize, Action, Caller, Role};
use crate::certificates::{
    Certificate, CertificatePatch, CertificateStatus, CertificateStore, CertificateType,
    NewCertificate, StatusCounts,
};
use crate::identity::UserStore;
use crate::types::{RegistrarError, Result};

/// Upper bound applied to caller-supplied page sizes
pub const MAX_PAGE_SIZE: i64 = 200;

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

pub struct LifecycleManager {
    store: Arc<dyn CertificateStore>,
    users: Arc<dyn UserStore>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn CertificateStore>, users: Arc<dyn UserStore>) -> Self {
        Self { store, users }
    }

    /// Submit a new certificate request for the calling student
    pub async fn create(
        &self,
        caller: Caller,
        kind: CertificateType,
        request_data: serde_json::Value,
    ) -> Result<Certificate> {
        authorize(caller, Action::CreateCertificate, None)?;

        // The token may outlive the account; re-resolve before inserting
        let student = self
            .users
            .resolve(caller.id)
            .await?
            .ok_or_else(|| RegistrarError::NotFound("Student not found".into()))?;
        if student.role != Role::Student {
            return Err(RegistrarError::NotFound("Student not found".into()));
        }

        let certificate = self
            .store
            .insert(NewCertificate {
                student_id: student.id,
                kind,
                request_data,
            })
            .await?;

        info!(
            certificate_id = certificate.id,
            student_id = student.id,
            kind = %kind,
            "Certificate request created"
        );

        Ok(certificate)
    }

    /// Claim a pending certificate for the calling handler.
    ///
    /// The sole path by which a certificate acquires a handler: the store's
    /// compare-and-set on `pending` guarantees at most one staff member
    /// ever wins, no matter how many assign concurrently.
    pub async fn assign(&self, caller: Caller, certificate_id: i64) -> Result<Certificate> {
        authorize(caller, Action::AssignCertificate, None)?;
        self.require_handler(caller.id).await?;

        // Surface NotFound before Conflict for absent rows
        self.store
            .get_by_id(certificate_id)
            .await?
            .ok_or_else(|| {
                RegistrarError::NotFound(format!("Certificate {} not found", certificate_id))
            })?;

        let updated = self
            .store
            .conditional_update(
                certificate_id,
                CertificateStatus::Pending,
                CertificatePatch {
                    status: CertificateStatus::InProgress,
                    staff_id: Some(caller.id),
                    rejection_reason: None,
                    issued_at: None,
                },
            )
            .await
            .map_err(|e| match e {
                RegistrarError::Conflict(_) => RegistrarError::Conflict(
                    "Certificate is already assigned or processed".into(),
                ),
                other => other,
            })?;

        info!(
            certificate_id,
            staff_id = caller.id,
            "Certificate assigned"
        );

        Ok(updated)
    }

    /// Move a certificate to a new status.
    ///
    /// The acting handler is recorded on the row, overwriting any previous
    /// assignment. Transitions are checked against the status table;
    /// `rejected` requires a non-empty reason and `issued` stamps
    /// `issued_at`.
    pub async fn update_status(
        &self,
        caller: Caller,
        certificate_id: i64,
        new_status: CertificateStatus,
        rejection_reason: Option<String>,
    ) -> Result<Certificate> {
        authorize(caller, Action::UpdateCertificateStatus, None)?;
        self.require_handler(caller.id).await?;

        let rejection_reason = match new_status {
            CertificateStatus::Rejected => {
                let reason = rejection_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        RegistrarError::BadRequest(
                            "Rejection requires a non-empty reason".into(),
                        )
                    })?;
                Some(reason.to_string())
            }
            _ => None,
        };

        let current = self
            .store
            .get_by_id(certificate_id)
            .await?
            .ok_or_else(|| {
                RegistrarError::NotFound(format!("Certificate {} not found", certificate_id))
            })?;

        if !current.status.can_transition_to(new_status) {
            return Err(RegistrarError::Conflict(format!(
                "Certificate {} is {} and cannot move to {}",
                certificate_id, current.status, new_status
            )));
        }

        let issued_at = match new_status {
            CertificateStatus::Issued => Some(Utc::now()),
            _ => None,
        };

        // CAS on the status we just observed: a concurrent mutation in the
        // window surfaces as Conflict instead of a lost update
        let updated = self
            .store
            .conditional_update(
                certificate_id,
                current.status,
                CertificatePatch {
                    status: new_status,
                    staff_id: Some(caller.id),
                    rejection_reason,
                    issued_at,
                },
            )
            .await?;

        info!(
            certificate_id,
            staff_id = caller.id,
            from = %current.status,
            to = %new_status,
            "Certificate status updated"
        );

        Ok(updated)
    }

    /// Read a single certificate, applying the visibility rule
    pub async fn get(&self, caller: Caller, certificate_id: i64) -> Result<Certificate> {
        let certificate = self
            .store
            .get_by_id(certificate_id)
            .await?
            .ok_or_else(|| {
                RegistrarError::NotFound(format!("Certificate {} not found", certificate_id))
            })?;

        authorize(
            caller,
            Action::ViewCertificate,
            Some(certificate.student_id),
        )?;

        Ok(certificate)
    }

    /// The caller's own certificates, newest first
    pub async fn list_mine(
        &self,
        caller: Caller,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>> {
        authorize(caller, Action::ListOwnCertificates, None)?;
        self.store
            .list_by_student(caller.id, clamp_limit(limit), offset)
            .await
    }

    /// Certificates awaiting triage
    pub async fn list_pending(
        &self,
        caller: Caller,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>> {
        authorize(caller, Action::ListPendingCertificates, None)?;
        self.store
            .list_by_status(CertificateStatus::Pending, clamp_limit(limit), offset)
            .await
    }

    /// Every certificate
    pub async fn list_all(
        &self,
        caller: Caller,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>> {
        authorize(caller, Action::ListAllCertificates, None)?;
        self.store.list_all(clamp_limit(limit), offset).await
    }

    /// Per-status counts; pure aggregate read
    pub async fn statistics(&self, caller: Caller) -> Result<StatusCounts> {
        authorize(caller, Action::ViewStatistics, None)?;
        self.store.aggregate_counts().await
    }

    /// Resolve a caller id and require a staff/admin account
    async fn require_handler(&self, user_id: i64) -> Result<()> {
        let user = self
            .users
            .resolve(user_id)
            .await?
            .ok_or_else(|| RegistrarError::NotFound("Staff member not found".into()))?;
        if !user.role.is_handler() {
            return Err(RegistrarError::Forbidden(
                "Only staff may handle certificates".into(),
            ));
        }
        Ok(())
    }
}
