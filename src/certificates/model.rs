//! Certificate domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::certificates::{CertificateStatus, CertificateType};

/// A student's request for an administrative document, tracked through a
/// status lifecycle.
///
/// Invariants maintained by the lifecycle manager and its stores:
/// - `staff_id` is set iff the request has left `pending`
/// - `rejection_reason` is present iff status is `rejected`
/// - `issued_at` is present iff status is `issued`
/// - `student_id` and `kind` never change after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub student_id: i64,
    pub staff_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: CertificateType,
    pub status: CertificateStatus,
    /// Free-form payload captured at submission; opaque to the lifecycle
    pub request_data: serde_json::Value,
    pub rejection_reason: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a new certificate
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub student_id: i64,
    pub kind: CertificateType,
    pub request_data: serde_json::Value,
}

/// Mutation applied by a conditional update.
///
/// `staff_id = Some(id)` assigns the acting handler; `None` leaves the
/// current assignment untouched. `rejection_reason` and `issued_at` are
/// set-to values: the stores write them as given, which keeps the
/// presence-iff-status invariants in one place (the patch builder).
#[derive(Debug, Clone)]
pub struct CertificatePatch {
    pub status: CertificateStatus,
    pub staff_id: Option<i64>,
    pub rejection_reason: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
}

/// Per-status certificate counts for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub ready: u64,
    pub issued: u64,
    pub rejected: u64,
}

impl StatusCounts {
    /// Add one certificate with the given status to the tally
    pub fn record(&mut self, status: CertificateStatus) {
        self.total += 1;
        match status {
            CertificateStatus::Pending => self.pending += 1,
            CertificateStatus::InProgress => self.in_progress += 1,
            CertificateStatus::Ready => self.ready += 1,
            CertificateStatus::Issued => self.issued += 1,
            CertificateStatus::Rejected => self.rejected += 1,
        }
    }
}
