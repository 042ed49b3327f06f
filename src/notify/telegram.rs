use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Alert, NotificationChannel, NotifyError};
use crate::config::TelegramConfig;
use crate::db::Channel;

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Sends alerts through the Telegram Bot API `sendMessage` method.
pub struct TelegramChannel {
    http: Client,
    /// `{api_base}/bot{token}`; never logged.
    base_url: String,
    chat_id: String,
}

impl TelegramChannel {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let text = alert.body();
        let req = SendMessageRequest {
            chat_id: &self.chat_id,
            text: &text,
            disable_web_page_preview: false,
        };

        debug!(post = %alert.identity, "Sending Telegram message");

        let resp = self
            .http
            .post(format!("{}/sendMessage", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        let body: TelegramResponse = resp
            .json()
            .await
            .map_err(|e| NotifyError::Rejected(format!("HTTP {status}: {}", e.without_url())))?;

        if !body.ok {
            let desc = body.description.unwrap_or_else(|| "unknown error".into());
            return Err(NotifyError::Rejected(desc));
        }

        Ok(())
    }
}
