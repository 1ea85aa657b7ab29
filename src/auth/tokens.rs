//! Server-side refresh-token store
//!
//! One live refresh token per user: issuing a new one replaces the old
//! (rotation), logout deletes it (revocation). Entries expire with the
//! token itself. In-memory; a restart invalidates refresh sessions while
//! outstanding access tokens remain valid until expiry.

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredToken {
    token: String,
    expires_at: Instant,
}

/// Refresh-token store keyed by user id
pub struct RefreshTokenStore {
    entries: DashMap<i64, StoredToken>,
    ttl: Duration,
}

impl RefreshTokenStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Record the current refresh token for a user, replacing any previous one
    pub fn put(&self, user_id: i64, token: &str) {
        self.entries.insert(
            user_id,
            StoredToken {
                token: token.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Check that `token` is the live refresh token for `user_id`
    pub fn matches(&self, user_id: i64, token: &str) -> bool {
        if let Some(entry) = self.entries.get(&user_id) {
            if entry.expires_at > Instant::now() {
                return entry.token == token;
            }
            // Entry expired, remove it
            drop(entry); // Release the reference before removing
            self.entries.remove(&user_id);
        }
        false
    }

    /// Revoke the user's refresh token (logout)
    pub fn revoke(&self, user_id: i64) {
        self.entries.remove(&user_id);
    }

    /// Number of live entries, for the status endpoint
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_match() {
        let store = RefreshTokenStore::new(60);
        store.put(7, "token-a");
        assert!(store.matches(7, "token-a"));
        assert!(!store.matches(7, "token-b"));
        assert!(!store.matches(8, "token-a"));
    }

    #[test]
    fn test_rotation_replaces_previous_token() {
        let store = RefreshTokenStore::new(60);
        store.put(7, "token-a");
        store.put(7, "token-b");
        assert!(!store.matches(7, "token-a"));
        assert!(store.matches(7, "token-b"));
    }

    #[test]
    fn test_revoke() {
        let store = RefreshTokenStore::new(60);
        store.put(7, "token-a");
        store.revoke(7);
        assert!(!store.matches(7, "token-a"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_entry_is_rejected() {
        let store = RefreshTokenStore::new(0);
        store.put(7, "token-a");
        std::thread::sleep(Duration::from_millis(5));
        assert!(!store.matches(7, "token-a"));
    }
}
