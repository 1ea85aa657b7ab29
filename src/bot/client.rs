//! Messenger API transport
//!
//! Minimal client for the bot platform: long-poll updates, send plain
//! text messages. Authenticated with a bearer token.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{RegistrarError, Result};

/// An incoming message
#[derive(Debug, Clone, Deserialize)]
pub struct BotMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub text: Option<String>,
}

/// One long-poll update
#[derive(Debug, Clone, Deserialize)]
pub struct BotUpdate {
    pub id: i64,
    pub message: Option<BotMessage>,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    updates: Vec<BotUpdate>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

pub struct BotApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    poll_timeout: Duration,
}

impl BotApiClient {
    pub fn new(base_url: String, token: String, poll_timeout_seconds: u64) -> Self {
        let poll_timeout = Duration::from_secs(poll_timeout_seconds);
        let http = reqwest::Client::builder()
            // Allow for the long-poll hold plus network slack
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            poll_timeout,
        }
    }

    /// Fetch updates after `marker`, holding the request open up to the
    /// poll timeout
    pub async fn get_updates(&self, marker: Option<i64>) -> Result<Vec<BotUpdate>> {
        let mut request = self
            .http
            .get(format!("{}/updates", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("timeout", self.poll_timeout.as_secs())]);

        if let Some(marker) = marker {
            request = request.query(&[("marker", marker)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistrarError::Http(format!("Bot poll error: {}", e)))?;

        if !response.status().is_success() {
            return Err(RegistrarError::Http(format!(
                "Bot poll returned {}",
                response.status()
            )));
        }

        let body: UpdatesResponse = response
            .json()
            .await
            .map_err(|e| RegistrarError::Http(format!("Bad bot poll response: {}", e)))?;

        Ok(body.updates)
    }

    /// Send a plain text message to a chat
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/messages/send", self.base_url))
            .bearer_auth(&self.token)
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await
            .map_err(|e| RegistrarError::Http(format!("Bot send error: {}", e)))?;

        if !response.status().is_success() {
            return Err(RegistrarError::Http(format!(
                "Bot send returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
