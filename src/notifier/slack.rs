use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use log::{debug, error, info};
use slack_morphism::prelude::*;

use super::Notifier;
use crate::config::SlackConfig;

pub struct SlackNotifier {
    client: SlackClient<SlackClientHyperHttpsConnector>,
    token: SlackApiToken,
    channel_id: SlackChannelId,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        info!("Initializing Slack notifier (channel {})", config.channel_id);

        let client = SlackClient::new(SlackClientHyperHttpsConnector::new()?);
        let token = SlackApiToken::new(config.bot_token.clone().into());
        let channel_id = SlackChannelId::new(config.channel_id.clone());

        Ok(SlackNotifier {
            client,
            token,
            channel_id,
        })
    }

    /// Posts `text` to the configured channel.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let post_chat_req = SlackApiChatPostMessageRequest::new(
            self.channel_id.clone(),
            SlackMessageContent::new().with_text(to_slack_text(text)),
        );

        let session = self.client.open_session(&self.token);

        match session.chat_post_message(&post_chat_req).await {
            Ok(response) => {
                debug!("Slack message posted: {:?}", response.ts);
                Ok(())
            }
            Err(e) => {
                error!("❌ Error sending Slack message: {}", e);
                Err(anyhow::anyhow!("Unable to send Slack message: {}", e))
            }
        }
    }
}

impl Notifier for SlackNotifier {
    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        self.send_message(text).boxed()
    }
}

/// Rewrites a Telegram-escaped notification for Slack mrkdwn.
///
/// Slack has no backslash escapes, so the `\_ \* \[ \]` escapes are dropped
/// and `&`, `<`, `>` become entities. Underscores and asterisks in the
/// message fields may therefore still be read as Slack formatting.
pub fn to_slack_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek().copied(), Some('_' | '*' | '[' | ']')) => {}
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
