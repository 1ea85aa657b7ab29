//! MongoDB-backed file store

use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use mongodb::Collection;

use crate::db::schemas::{CertificateFileDoc, FILE_COLLECTION, FILE_SEQUENCE};
use crate::db::MongoClient;
use crate::files::{CertificateFile, FileStore, NewCertificateFile};
use crate::types::Result;

pub struct MongoFileStore {
    client: MongoClient,
}

impl MongoFileStore {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    fn collection(&self) -> Collection<CertificateFileDoc> {
        self.client.collection(FILE_COLLECTION)
    }
}

#[async_trait]
impl FileStore for MongoFileStore {
    async fn insert(&self, new: NewCertificateFile) -> Result<CertificateFile> {
        let file = CertificateFile {
            id: self.client.next_id(FILE_SEQUENCE).await?,
            certificate_id: new.certificate_id,
            file_name: new.file_name,
            stored_path: new.stored_path,
            size_bytes: new.size_bytes,
            mime_type: new.mime_type,
            uploaded_by: new.uploaded_by,
            uploaded_at: Utc::now(),
        };

        self.collection()
            .insert_one(CertificateFileDoc::from(file.clone()))
            .await?;

        Ok(file)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CertificateFile>> {
        Ok(self
            .collection()
            .find_one(doc! { "_id": id })
            .await?
            .map(CertificateFile::from))
    }

    async fn find_by_certificate(&self, certificate_id: i64) -> Result<Option<CertificateFile>> {
        // Latest wins: newest upload shadows any earlier ones
        Ok(self
            .collection()
            .find_one(doc! { "certificate_id": certificate_id })
            .sort(doc! { "uploaded_at": -1, "_id": -1 })
            .await?
            .map(CertificateFile::from))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = self.collection().delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
