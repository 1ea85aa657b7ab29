//! MongoDB client wrapper
//!
//! Thin wrapper over the driver: verifies connectivity on startup, hands
//! out typed collections, and allocates sequential integer ids from a
//! `counters` collection via atomic upserts.

use bson::doc;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{RegistrarError, Result};

const COUNTER_COLLECTION: &str = "counters";

#[derive(Debug, Serialize, Deserialize)]
struct CounterDoc {
    #[serde(rename = "_id")]
    id: String,
    seq: i64,
}

/// MongoDB connection handle
#[derive(Clone)]
pub struct MongoClient {
    db: Database,
}

impl MongoClient {
    /// Connect and ping the server so a bad URI fails at startup, not on
    /// the first request
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);

        let this = Self { db };
        this.ping().await?;
        debug!(db = db_name, "MongoDB ping ok");

        Ok(this)
    }

    /// Round-trip to the server, used by the readiness probe
    pub async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// Get a typed collection handle
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Allocate the next id in a named sequence.
    ///
    /// Single atomic `$inc` upsert, so concurrent allocators never receive
    /// the same id.
    pub async fn next_id(&self, sequence: &str) -> Result<i64> {
        let counters: Collection<CounterDoc> = self.db.collection(COUNTER_COLLECTION);

        let updated = counters
            .find_one_and_update(doc! { "_id": sequence }, doc! { "$inc": { "seq": 1 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| {
                RegistrarError::Database("Counter upsert returned no document".into())
            })?;

        Ok(updated.seq)
    }
}
