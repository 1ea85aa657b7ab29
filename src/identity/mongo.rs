//! MongoDB-backed user store

use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::Collection;
use tracing::warn;

use crate::db::schemas::{UserDoc, USER_COLLECTION, USER_SEQUENCE};
use crate::db::MongoClient;
use crate::identity::{NewUser, User, UserStore};
use crate::types::{RegistrarError, Result};

pub struct MongoUserStore {
    client: MongoClient,
}

impl MongoUserStore {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    fn collection(&self) -> Collection<UserDoc> {
        self.client.collection(USER_COLLECTION)
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, new: NewUser) -> Result<User> {
        let collection = self.collection();

        if collection
            .find_one(doc! { "email": &new.email })
            .await?
            .is_some()
        {
            return Err(RegistrarError::Conflict(
                "An account with this email already exists".into(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: self.client.next_id(USER_SEQUENCE).await?,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            first_name: new.first_name,
            last_name: new.last_name,
            middle_name: new.middle_name,
            phone: new.phone,
            profile: new.profile,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = collection.insert_one(UserDoc::from(user.clone())).await {
            // Duplicate key from a concurrent registration with the same email
            let error_str = e.to_string();
            if error_str.contains("duplicate key") || error_str.contains("E11000") {
                warn!(email = %user.email, "Concurrent registration lost the race");
                return Err(RegistrarError::Conflict(
                    "An account with this email already exists".into(),
                ));
            }
            return Err(e.into());
        }

        Ok(user)
    }

    async fn resolve(&self, id: i64) -> Result<Option<User>> {
        Ok(self
            .collection()
            .find_one(doc! { "_id": id })
            .await?
            .map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .collection()
            .find_one(doc! { "email": email })
            .await?
            .map(User::from))
    }

    async fn list(&self, limit: i64, offset: u64) -> Result<Vec<User>> {
        let cursor = self
            .collection()
            .find(doc! {})
            .sort(doc! { "_id": -1 })
            .skip(offset)
            .limit(limit)
            .await?;

        let docs: Vec<UserDoc> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(User::from).collect())
    }
}
