//! MongoDB-backed certificate store
//!
//! The conditional update is a single `find_one_and_update` whose filter
//! matches both the id and the expected status, so the compare-and-set
//! happens inside the database: of two concurrent mutations, exactly one
//! matches and the other comes back empty.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::Collection;

use crate::certificates::{
    Certificate, CertificatePatch, CertificateStatus, CertificateStore, NewCertificate,
    StatusCounts,
};
use crate::db::schemas::{CertificateDoc, CERTIFICATE_COLLECTION, CERTIFICATE_SEQUENCE};
use crate::db::MongoClient;
use crate::types::{RegistrarError, Result};

pub struct MongoCertificateStore {
    client: MongoClient,
}

impl MongoCertificateStore {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    fn collection(&self) -> Collection<CertificateDoc> {
        self.client.collection(CERTIFICATE_COLLECTION)
    }

    async fn list_filtered(
        &self,
        filter: Document,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>> {
        let cursor = self
            .collection()
            .find(filter)
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(offset)
            .limit(limit)
            .await?;

        let docs: Vec<CertificateDoc> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Certificate::from).collect())
    }
}

#[async_trait]
impl CertificateStore for MongoCertificateStore {
    async fn insert(&self, new: NewCertificate) -> Result<Certificate> {
        let now = Utc::now();
        let certificate = Certificate {
            id: self.client.next_id(CERTIFICATE_SEQUENCE).await?,
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

        self.collection()
            .insert_one(CertificateDoc::from(certificate.clone()))
            .await?;

        Ok(certificate)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Certificate>> {
        Ok(self
            .collection()
            .find_one(doc! { "_id": id })
            .await?
            .map(Certificate::from))
    }

    async fn conditional_update(
        &self,
        id: i64,
        expected: CertificateStatus,
        patch: CertificatePatch,
    ) -> Result<Certificate> {
        let mut set = doc! {
            "status": patch.status.to_string(),
            "rejection_reason": patch.rejection_reason.map(Bson::String).unwrap_or(Bson::Null),
            "issued_at": patch
                .issued_at
                .map(|dt| Bson::DateTime(bson::DateTime::from_chrono(dt)))
                .unwrap_or(Bson::Null),
            "updated_at": bson::DateTime::from_chrono(Utc::now()),
        };
        if let Some(staff_id) = patch.staff_id {
            set.insert("staff_id", staff_id);
        }

        let updated = self
            .collection()
            .find_one_and_update(
                doc! { "_id": id, "status": expected.to_string() },
                doc! { "$set": set },
            )
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(doc) => Ok(Certificate::from(doc)),
            // Filter missed: either the row is gone or the status moved
            // under us. Distinguish with a plain read.
            None => match self.get_by_id(id).await? {
                Some(current) => Err(RegistrarError::Conflict(format!(
                    "Certificate {} is no longer {} (now {})",
                    id, expected, current.status
                ))),
                None => Err(RegistrarError::NotFound(format!(
                    "Certificate {} not found",
                    id
                ))),
            },
        }
    }

    async fn list_by_student(
        &self,
        student_id: i64,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>> {
        self.list_filtered(doc! { "student_id": student_id }, limit, offset)
            .await
    }

    async fn list_by_status(
        &self,
        status: CertificateStatus,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<Certificate>> {
        self.list_filtered(doc! { "status": status.to_string() }, limit, offset)
            .await
    }

    async fn list_all(&self, limit: i64, offset: u64) -> Result<Vec<Certificate>> {
        self.list_filtered(doc! {}, limit, offset).await
    }

    async fn aggregate_counts(&self) -> Result<StatusCounts> {
        let pipeline = vec![doc! {
            "$group": { "_id": "$status", "count": { "$sum": 1 } }
        }];

        let mut cursor = self.collection().aggregate(pipeline).await?;
        let mut counts = StatusCounts::default();

        while let Some(doc) = cursor.try_next().await? {
            let status = doc
                .get_str("_id")
                .map_err(|e| RegistrarError::Database(format!("Bad aggregate row: {}", e)))?;
            let count = doc.get_i32("count").map(i64::from).or_else(|_| doc.get_i64("count"));
            let count = count
                .map_err(|e| RegistrarError::Database(format!("Bad aggregate count: {}", e)))?
                .max(0) as u64;

            let status: CertificateStatus = status
                .parse()
                .map_err(|e: String| RegistrarError::Database(e))?;

            counts.total += count;
            match status {
                CertificateStatus::Pending => counts.pending = count,
                CertificateStatus::InProgress => counts.in_progress = count,
                CertificateStatus::Ready => counts.ready = count,
                CertificateStatus::Issued => counts.issued = count,
                CertificateStatus::Rejected => counts.rejected = count,
            }
        }

        Ok(counts)
    }
}
