//! Conversational dialog engine
//!
//! A small state machine per chat: unauthenticated users walk through
//! /login → email → password, authenticated users submit and list
//! certificate requests. The engine takes the current session and the
//! incoming text and returns the successor session plus the reply, which
//! keeps it a pure function over the injected services and makes every
//! dialog path unit-testable without a network.

use std::str::FromStr;
use std::sync::Arc;

use crate::auth::{verify_password, Caller};
use crate::certificates::{CertificateType, LifecycleManager};
use crate::identity::UserStore;
use crate::types::RegistrarError;

/// Where a chat currently is in the login dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Idle,
    WaitingLogin,
    WaitingPassword,
}

/// Conversation state for one chat
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub state: DialogState,
    /// Email captured while waiting for the password
    pub pending_login: Option<String>,
    /// Set once the chat has signed in
    pub caller: Option<Caller>,
}

pub struct DialogEngine {
    users: Arc<dyn UserStore>,
    lifecycle: Arc<LifecycleManager>,
}

impl DialogEngine {
    pub fn new(users: Arc<dyn UserStore>, lifecycle: Arc<LifecycleManager>) -> Self {
        Self { users, lifecycle }
    }

    /// Process one incoming message
    pub async fn handle(&self, mut session: Session, text: &str) -> (Session, String) {
        let text = text.trim();

        // /cancel aborts any dialog, whatever state it is in
        if text.eq_ignore_ascii_case("/cancel") {
            session.state = DialogState::Idle;
            session.pending_login = None;
            return (session, "Cancelled.".to_string());
        }

        match session.state {
            DialogState::WaitingLogin => {
                session.pending_login = Some(text.to_string());
                session.state = DialogState::WaitingPassword;
                (session, "Enter your password:".to_string())
            }
            DialogState::WaitingPassword => self.finish_login(session, text).await,
            DialogState::Idle => self.dispatch_command(session, text).await,
        }
    }

    async fn dispatch_command(&self, mut session: Session, text: &str) -> (Session, String) {
        let (command, argument) = match text.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (text, ""),
        };

        match command.to_lowercase().as_str() {
            "/start" => (session, START_TEXT.to_string()),
            "/help" => (session, HELP_TEXT.to_string()),
            "/status" => {
                let reply = match &session.caller {
                    Some(caller) => format!(
                        "Registrar service is running. Signed in as user #{} ({}).",
                        caller.id, caller.role
                    ),
                    None => "Registrar service is running. Use /login to sign in.".to_string(),
                };
                (session, reply)
            }
            "/login" => {
                if session.caller.is_some() {
                    return (session, "Already signed in. Use /logout first.".to_string());
                }
                session.state = DialogState::WaitingLogin;
                (session, "Enter your email:".to_string())
            }
            "/logout" => {
                session.caller = None;
                session.pending_login = None;
                (session, "Signed out.".to_string())
            }
            "/my" => self.list_my_certificates(session).await,
            "/new" => self.submit_request(session, argument).await,
            _ => (
                session,
                "Unknown command. Send /help for the list of commands.".to_string(),
            ),
        }
    }

    async fn finish_login(&self, mut session: Session, password: &str) -> (Session, String) {
        let email = session.pending_login.take().unwrap_or_default();
        session.state = DialogState::Idle;

        let user = match self.users.find_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => return (session, LOGIN_FAILED.to_string()),
            Err(_) => return (session, SERVICE_ERROR.to_string()),
        };

        match verify_password(password, &user.password_hash) {
            Ok(true) => {
                session.caller = Some(Caller::new(user.id, user.role));
                (
                    session,
                    format!(
                        "Signed in as {} {} ({}).\nSend /help for the list of commands.",
                        user.first_name, user.last_name, user.role
                    ),
                )
            }
            Ok(false) => (session, LOGIN_FAILED.to_string()),
            Err(_) => (session, SERVICE_ERROR.to_string()),
        }
    }

    async fn list_my_certificates(&self, session: Session) -> (Session, String) {
        let Some(caller) = session.caller else {
            return (session, NOT_SIGNED_IN.to_string());
        };

        match self.lifecycle.list_mine(caller, 10, 0).await {
            Ok(certificates) if certificates.is_empty() => (
                session,
                "You have no certificate requests yet. Submit one with /new <type>.".to_string(),
            ),
            Ok(certificates) => {
                let mut lines = vec!["Your latest requests:".to_string()];
                for cert in certificates {
                    let mut line = format!("#{} {} — {}", cert.id, cert.kind, cert.status);
                    if let Some(reason) = &cert.rejection_reason {
                        line.push_str(&format!(" ({})", reason));
                    }
                    lines.push(line);
                }
                (session, lines.join("\n"))
            }
            Err(RegistrarError::Forbidden(_)) => (session, NOT_SIGNED_IN.to_string()),
            Err(_) => (session, SERVICE_ERROR.to_string()),
        }
    }

    async fn submit_request(&self, session: Session, argument: &str) -> (Session, String) {
        let Some(caller) = session.caller else {
            return (session, NOT_SIGNED_IN.to_string());
        };

        let Ok(kind) = CertificateType::from_str(argument) else {
            return (
                session,
                "Usage: /new <enrollment|academic|attendance|graduation|other>".to_string(),
            );
        };

        match self
            .lifecycle
            .create(caller, kind, serde_json::json!({ "channel": "bot" }))
            .await
        {
            Ok(certificate) => (
                session,
                format!(
                    "Request #{} ({}) submitted. Current status: {}.",
                    certificate.id, certificate.kind, certificate.status
                ),
            ),
            Err(RegistrarError::Forbidden(_)) => (
                session,
                "Only students can submit certificate requests.".to_string(),
            ),
            Err(_) => (session, SERVICE_ERROR.to_string()),
        }
    }
}

const START_TEXT: &str = "Welcome to the registrar certificate bot.\n\n\
/login - sign in with your account\n\
/my - list your certificate requests\n\
/new <type> - submit a new request\n\
/help - all commands";

const HELP_TEXT: &str = "Commands:\n\
/start - welcome message\n\
/login - sign in with your account\n\
/logout - sign out\n\
/my - list your certificate requests\n\
/new <type> - submit a request (enrollment, academic, attendance, graduation, other)\n\
/status - service status\n\
/cancel - abort the current dialog";

const NOT_SIGNED_IN: &str = "You are not signed in. Use /login first.";
const LOGIN_FAILED: &str = "Invalid credentials. Use /login to try again.";
const SERVICE_ERROR: &str = "Something went wrong. Please try again later.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, Role};
    use crate::certificates::{CertificateStatus, MemoryCertificateStore};
    use crate::identity::{MemoryUserStore, NewUser};

    struct Fixture {
        engine: DialogEngine,
        lifecycle: Arc<LifecycleManager>,
        staff: Caller,
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserStore::new());

        users
            .insert(NewUser {
                email: "anna@university.edu".into(),
                password_hash: hash_password("correct-password").unwrap(),
                role: Role::Student,
                first_name: "Anna".into(),
                last_name: "Petrova".into(),
                middle_name: None,
                phone: None,
                profile: None,
            })
            .await
            .unwrap();

        let staff_user = users
            .insert(NewUser {
                email: "clerk@university.edu".into(),
                password_hash: hash_password("staff-password").unwrap(),
                role: Role::Staff,
                first_name: "Boris".into(),
                last_name: "Ivanov".into(),
                middle_name: None,
                phone: None,
                profile: None,
            })
            .await
            .unwrap();

        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::new(MemoryCertificateStore::new()),
            Arc::clone(&users) as Arc<dyn UserStore>,
        ));

        Fixture {
            engine: DialogEngine::new(users, Arc::clone(&lifecycle)),
            lifecycle,
            staff: Caller::new(staff_user.id, Role::Staff),
        }
    }

    async fn signed_in(fx: &Fixture) -> Session {
        let (session, _) = fx.engine.handle(Session::default(), "/login").await;
        let (session, _) = fx.engine.handle(session, "anna@university.edu").await;
        let (session, reply) = fx.engine.handle(session, "correct-password").await;
        assert!(reply.contains("Signed in as Anna Petrova"));
        session
    }

    #[tokio::test]
    async fn test_login_dialog_walks_through_states() {
        let fx = fixture().await;

        let (session, reply) = fx.engine.handle(Session::default(), "/login").await;
        assert_eq!(session.state, DialogState::WaitingLogin);
        assert!(reply.contains("email"));

        let (session, reply) = fx.engine.handle(session, "anna@university.edu").await;
        assert_eq!(session.state, DialogState::WaitingPassword);
        assert!(reply.contains("password"));

        let (session, _) = fx.engine.handle(session, "correct-password").await;
        assert_eq!(session.state, DialogState::Idle);
        assert!(session.caller.is_some());
    }

    #[tokio::test]
    async fn test_wrong_password_resets_dialog() {
        let fx = fixture().await;

        let (session, _) = fx.engine.handle(Session::default(), "/login").await;
        let (session, _) = fx.engine.handle(session, "anna@university.edu").await;
        let (session, reply) = fx.engine.handle(session, "wrong-password").await;

        assert_eq!(session.state, DialogState::Idle);
        assert!(session.caller.is_none());
        assert_eq!(reply, LOGIN_FAILED);
    }

    #[tokio::test]
    async fn test_unknown_account_fails_like_wrong_password() {
        let fx = fixture().await;

        let (session, _) = fx.engine.handle(Session::default(), "/login").await;
        let (session, _) = fx.engine.handle(session, "ghost@university.edu").await;
        let (session, reply) = fx.engine.handle(session, "whatever").await;

        assert!(session.caller.is_none());
        assert_eq!(reply, LOGIN_FAILED);
    }

    #[tokio::test]
    async fn test_cancel_aborts_dialog_mid_login() {
        let fx = fixture().await;

        let (session, _) = fx.engine.handle(Session::default(), "/login").await;
        let (session, _) = fx.engine.handle(session, "anna@university.edu").await;
        let (session, reply) = fx.engine.handle(session, "/cancel").await;

        assert_eq!(session.state, DialogState::Idle);
        assert!(session.pending_login.is_none());
        assert_eq!(reply, "Cancelled.");
    }

    #[tokio::test]
    async fn test_new_and_my_drive_the_lifecycle() {
        let fx = fixture().await;
        let session = signed_in(&fx).await;

        let (session, reply) = fx.engine.handle(session, "/new enrollment").await;
        assert!(reply.contains("submitted"));
        assert!(reply.contains("pending"));

        let (_, reply) = fx.engine.handle(session, "/my").await;
        assert!(reply.contains("enrollment"));
        assert!(reply.contains("pending"));

        // The request is visible to staff through the ordinary lifecycle
        let pending = fx.lifecycle.list_pending(fx.staff, 10, 0).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, CertificateStatus::Pending);
    }

    #[tokio::test]
    async fn test_new_rejects_bad_type_and_anonymous_callers() {
        let fx = fixture().await;

        let (session, reply) = fx.engine.handle(Session::default(), "/new enrollment").await;
        assert_eq!(reply, NOT_SIGNED_IN);

        let session = {
            let (mut s, _) = fx.engine.handle(session, "/start").await;
            s.caller = Some(Caller::new(1, Role::Student));
            s
        };
        let (_, reply) = fx.engine.handle(session, "/new diploma").await;
        assert!(reply.starts_with("Usage:"));
    }

    #[tokio::test]
    async fn test_staff_cannot_submit_requests() {
        let fx = fixture().await;

        let (session, _) = fx.engine.handle(Session::default(), "/login").await;
        let (session, _) = fx.engine.handle(session, "clerk@university.edu").await;
        let (session, reply) = fx.engine.handle(session, "staff-password").await;
        assert!(reply.contains("Signed in"));

        let (_, reply) = fx.engine.handle(session, "/new enrollment").await;
        assert!(reply.contains("Only students"));
    }

    #[tokio::test]
    async fn test_logout_and_status() {
        let fx = fixture().await;
        let session = signed_in(&fx).await;

        let (session, reply) = fx.engine.handle(session, "/status").await;
        assert!(reply.contains("Signed in as user"));

        let (session, reply) = fx.engine.handle(session, "/logout").await;
        assert!(session.caller.is_none());
        assert_eq!(reply, "Signed out.");

        let (_, reply) = fx.engine.handle(session, "/my").await;
        assert_eq!(reply, NOT_SIGNED_IN);
    }

    #[tokio::test]
    async fn test_unknown_command_points_to_help() {
        let fx = fixture().await;
        let (_, reply) = fx.engine.handle(Session::default(), "hello there").await;
        assert!(reply.contains("/help"));
    }
}
