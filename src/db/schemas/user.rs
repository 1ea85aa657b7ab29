//! User document schema

use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::identity::{Profile, User};

pub const USER_COLLECTION: &str = "users";
pub const USER_SEQUENCE: &str = "user_id";

/// MongoDB document for a registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub phone: Option<String>,
    pub profile: Option<Profile>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

impl From<User> for UserDoc {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            middle_name: user.middle_name,
            phone: user.phone,
            profile: user.profile,
            created_at: bson::DateTime::from_chrono(user.created_at),
            updated_at: bson::DateTime::from_chrono(user.updated_at),
        }
    }
}

impl From<UserDoc> for User {
    fn from(doc: UserDoc) -> Self {
        Self {
            id: doc.id,
            email: doc.email,
            password_hash: doc.password_hash,
            role: doc.role,
            first_name: doc.first_name,
            last_name: doc.last_name,
            middle_name: doc.middle_name,
            phone: doc.phone,
            profile: doc.profile,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.to_chrono(),
        }
    }
}
