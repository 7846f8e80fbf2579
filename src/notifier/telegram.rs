use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};

use super::Notifier;
use crate::config::TelegramConfig;

const TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";

/// Bounded wait for one sendMessage call.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API notifier; messages use the legacy Markdown parse mode.
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        Self::with_base_url(config, TELEGRAM_API_BASE_URL)
    }

    /// Same as [`TelegramNotifier::new`] against another Bot API server.
    pub fn with_base_url(config: &TelegramConfig, base_url: &str) -> Result<Self> {
        info!("Initializing Telegram notifier (chat {})", config.chat_id);

        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Unable to build Telegram HTTP client")?;

        Ok(TelegramNotifier {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Telegram sendMessage request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error: {} {}", status.as_u16(), body);
        }

        debug!("Telegram message delivered to chat {}", self.chat_id);
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        self.send_message(text).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_layout() {
        let config = TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
        };
        let notifier = TelegramNotifier::with_base_url(&config, "http://localhost:8081/").unwrap();

        assert_eq!(notifier.api_url("sendMessage"), "http://localhost:8081/bot123:abc/sendMessage");
    }

    #[tokio::test]
    async fn test_transport_error_hides_bot_token() {
        let config = TelegramConfig {
            bot_token: "123456:SECRET-TOKEN".to_string(),
            chat_id: "42".to_string(),
        };
        // Nothing listens on port 1, so the request fails before any response.
        let notifier = TelegramNotifier::with_base_url(&config, "http://127.0.0.1:1").unwrap();

        let err = notifier.send("hi").await.unwrap_err();
        let rendered = format!("{:#}", err);

        assert!(rendered.starts_with("Telegram sendMessage request failed"), "{}", rendered);
        assert!(!rendered.contains("SECRET-TOKEN"), "token leaked: {}", rendered);
    }
}
