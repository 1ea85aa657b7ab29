//! Certificate document schema

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::certificates::{Certificate, CertificateStatus, CertificateType};

pub const CERTIFICATE_COLLECTION: &str = "certificates";
pub const CERTIFICATE_SEQUENCE: &str = "certificate_id";

/// MongoDB document for a certificate row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateDoc {
    #[serde(rename = "_id")]
    pub id: i64,
    pub student_id: i64,
    pub staff_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: CertificateType,
    pub status: CertificateStatus,
    pub request_data: Bson,
    pub rejection_reason: Option<String>,
    pub issued_at: Option<bson::DateTime>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl From<Certificate> for CertificateDoc {
    fn from(cert: Certificate) -> Self {
        Self {
            id: cert.id,
            student_id: cert.student_id,
            staff_id: cert.staff_id,
            kind: cert.kind,
            status: cert.status,
            request_data: bson::to_bson(&cert.request_data).unwrap_or(Bson::Null),
            rejection_reason: cert.rejection_reason,
            issued_at: cert.issued_at.map(bson::DateTime::from_chrono),
            created_at: bson::DateTime::from_chrono(cert.created_at),
            updated_at: bson::DateTime::from_chrono(cert.updated_at),
        }
    }
}

impl From<CertificateDoc> for Certificate {
    fn from(doc: CertificateDoc) -> Self {
        Self {
            id: doc.id,
            student_id: doc.student_id,
            staff_id: doc.staff_id,
            kind: doc.kind,
            status: doc.status,
            request_data: doc.request_data.into_relaxed_extjson(),
            rejection_reason: doc.rejection_reason,
            issued_at: doc.issued_at.map(|dt| dt.to_chrono()),
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.to_chrono(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_round_trip_preserves_fields() {
        let now = Utc::now();
        let cert = Certificate {
            id: 5,
            student_id: 7,
            staff_id: Some(3),
            kind: CertificateType::Enrollment,
            status: CertificateStatus::Rejected,
            request_data: serde_json::json!({"copies": 2}),
            rejection_reason: Some("Missing documents".into()),
            issued_at: None,
            created_at: now,
            updated_at: now,
        };

        let doc = CertificateDoc::from(cert.clone());
        let back = Certificate::from(doc);

        assert_eq!(back.id, cert.id);
        assert_eq!(back.student_id, cert.student_id);
        assert_eq!(back.staff_id, cert.staff_id);
        assert_eq!(back.status, cert.status);
        assert_eq!(back.rejection_reason, cert.rejection_reason);
        assert_eq!(back.request_data["copies"], serde_json::json!(2));
        // BSON datetimes carry millisecond precision
        assert_eq!(
            back.created_at.timestamp_millis(),
            cert.created_at.timestamp_millis()
        );
    }
}
