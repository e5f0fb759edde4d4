use super::Notifier;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

/// Public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends notifications through the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
}

impl TelegramNotifier {
    /// Client for the public Bot API.
    #[must_use]
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, bot_token)
    }

    /// Client for a custom Bot API server.
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>, bot_token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, text))]
    async fn notify(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.bot_token.expose_secret()
        );

        // The request URL contains the bot token, strip it from any error
        let response = self
            .client
            .post(url)
            .json(&SendMessage { chat_id, text })
            .send()
            .await
            .map_err(|e| Error::from(e.without_url()))?;

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::from(e.without_url()))?;

        if body.ok {
            Ok(())
        } else {
            Err(Error::Notification {
                message: body
                    .description
                    .unwrap_or_else(|| "Bot API rejected the message".to_string()),
            })
        }
    }
}
