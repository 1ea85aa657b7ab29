//! Per-chat session storage
//!
//! Sessions are keyed by chat id and handed to the dialog engine as plain
//! values: the engine receives a session, returns its successor, and the
//! store writes it back. Sessions are short-lived login dialogs, so an
//! in-memory map is enough; a restart only re-prompts the user.

use dashmap::DashMap;

use crate::bot::dialog::Session;

pub struct SessionStore {
    sessions: DashMap<i64, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Current session for a chat, or a fresh one
    pub fn take(&self, chat_id: i64) -> Session {
        self.sessions
            .get(&chat_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn put(&self, chat_id: i64, session: Session) {
        self.sessions.insert(chat_id, session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::dialog::DialogState;

    #[test]
    fn test_take_returns_fresh_session_for_unknown_chat() {
        let store = SessionStore::new();
        let session = store.take(42);
        assert_eq!(session.state, DialogState::Idle);
        assert!(session.caller.is_none());
    }

    #[test]
    fn test_put_then_take_round_trips() {
        let store = SessionStore::new();
        let mut session = store.take(42);
        session.state = DialogState::WaitingLogin;
        store.put(42, session);

        assert_eq!(store.take(42).state, DialogState::WaitingLogin);
        // Other chats are unaffected
        assert_eq!(store.take(43).state, DialogState::Idle);
    }
}
