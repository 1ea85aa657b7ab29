//! Identity Provider collaborator
//!
//! Resolves user identity and role for authorization decisions, and backs
//! the registration/login surface. Role is immutable once assigned.

pub mod mongo;

pub use mongo::MongoUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::auth::Role;
use crate::types::{RegistrarError, Result};

/// Student-specific profile data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Student card number
    pub student_number: String,
    pub group_name: Option<String>,
    pub faculty: Option<String>,
    pub specialty: Option<String>,
    pub year_of_study: Option<i32>,
}

/// Staff/admin-specific profile data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffProfile {
    pub position: String,
    pub department: Option<String>,
}

/// Role-specific profile attached to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Student(StudentProfile),
    Staff(StaffProfile),
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub phone: Option<String>,
    pub profile: Option<Profile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for registering a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub phone: Option<String>,
    pub profile: Option<Profile>,
}

/// Identity Provider contract: `resolve` is the call the lifecycle manager
/// makes before trusting a caller id
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user; fails with `Conflict` if the email is taken
    async fn insert(&self, new: NewUser) -> Result<User>;

    /// Resolve a user id to identity + role
    async fn resolve(&self, id: i64) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users, newest first (admin surface)
    async fn list(&self, limit: i64, offset: u64) -> Result<Vec<User>>;
}

/// In-memory user store for dev mode and tests
pub struct MemoryUserStore {
    users: DashMap<i64, User>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser) -> Result<User> {
        if self.find_by_email(&new.email).await?.is_some() {
            return Err(RegistrarError::Conflict(
                "An account with this email already exists".into(),
            ));
        }

        let now = Utc::now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
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
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn resolve(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.email == email)
            .map(|entry| entry.clone()))
    }

    async fn list(&self, limit: i64, offset: u64) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.clone()).collect();
        users.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(users
            .into_iter()
            .skip(offset as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_student(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::Student,
            first_name: "Anna".into(),
            last_name: "Petrova".into(),
            middle_name: None,
            phone: None,
            profile: Some(Profile::Student(StudentProfile {
                student_number: "S-1024".into(),
                group_name: Some("CS-301".into()),
                faculty: Some("Computer Science".into()),
                specialty: None,
                year_of_study: Some(3),
            })),
        }
    }

    #[tokio::test]
    async fn test_insert_and_resolve() {
        let store = MemoryUserStore::new();
        let user = store.insert(new_student("anna@university.edu")).await.unwrap();

        let resolved = store.resolve(user.id).await.unwrap().unwrap();
        assert_eq!(resolved.email, "anna@university.edu");
        assert_eq!(resolved.role, Role::Student);

        assert!(store.resolve(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryUserStore::new();
        store.insert(new_student("anna@university.edu")).await.unwrap();

        let err = store
            .insert(new_student("anna@university.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrarError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let store = MemoryUserStore::new();
        store.insert(new_student("anna@university.edu")).await.unwrap();

        assert!(store
            .find_by_email("anna@university.edu")
            .await
            .unwrap()
            .is_some());
        assert!(store.find_by_email("missing@university.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let store = MemoryUserStore::new();
        for i in 0..5 {
            store
                .insert(new_student(&format!("user{}@university.edu", i)))
                .await
                .unwrap();
        }

        let page = store.list(2, 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, 4);
        assert_eq!(page[1].id, 3);
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: 1,
            email: "anna@university.edu".into(),
            password_hash: "secret-hash".into(),
            role: Role::Student,
            first_name: "Anna".into(),
            last_name: "Petrova".into(),
            middle_name: None,
            phone: None,
            profile: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
