/// Chat notification backends
pub mod slack;
pub mod telegram;

use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;

use crate::config::{Config, ConfigError, NotificationBackend};

pub use slack::SlackNotifier;
pub use telegram::TelegramNotifier;

/// Delivers a text message to the configured chat destination.
pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Builds the notifier selected by `notification.backend`.
pub fn from_config(config: &Config) -> Result<Arc<dyn Notifier>> {
    match config.notification.backend {
        NotificationBackend::Telegram => {
            let telegram = config.telegram.as_ref().ok_or(ConfigError::Missing("telegram"))?;
            Ok(Arc::new(TelegramNotifier::new(telegram)?))
        }
        NotificationBackend::Slack => {
            let slack = config.slack.as_ref().ok_or(ConfigError::Missing("slack"))?;
            Ok(Arc::new(SlackNotifier::new(slack)?))
        }
    }
}
