//! Messenger bot channel
//!
//! An optional in-process task that long-polls the messenger API and
//! drives the same lifecycle manager as the HTTP surface. Conversational
//! state lives in an explicit session store and is passed through the
//! dialog engine per message; nothing global.

pub mod client;
pub mod dialog;
pub mod session;

pub use client::{BotApiClient, BotMessage, BotUpdate};
pub use dialog::{DialogEngine, DialogState, Session};
pub use session::SessionStore;

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::server::AppState;

/// Long-poll loop: fetch updates, run each message through the dialog
/// engine, send the reply. Poll errors back off instead of exiting.
pub async fn run_bot(state: Arc<AppState>, token: String) {
    let client = BotApiClient::new(
        state.args.bot_api_url.clone(),
        token,
        state.args.bot_poll_timeout_seconds,
    );
    let engine = DialogEngine::new(Arc::clone(&state.users), Arc::clone(&state.lifecycle));
    let sessions = SessionStore::new();

    info!("Bot channel started (polling {})", state.args.bot_api_url);

    let mut marker: Option<i64> = None;

    loop {
        let updates = match client.get_updates(marker).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Bot poll failed: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            marker = Some(update.id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text.as_deref() else {
                continue;
            };

            let session = sessions.take(message.chat_id);
            let (session, reply) = engine.handle(session, text).await;
            sessions.put(message.chat_id, session);

            if let Err(e) = client.send_message(message.chat_id, &reply).await {
                error!(chat_id = message.chat_id, "Failed to send bot reply: {}", e);
            }
        }
    }
}
