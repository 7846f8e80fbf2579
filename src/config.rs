use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::template::FormatTemplate;

/// Prefix of the environment variables overriding file values,
/// e.g. `INBOX_TRIAGE__CREDENTIALS__OPENAI_API_KEY`.
pub const ENV_PREFIX: &str = "INBOX_TRIAGE";

/// Number of `%s` sites in the important-email template: from, subject, preview, explanation.
pub const IMPORTANT_TEMPLATE_SITES: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to load configuration from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: ::config::ConfigError,
    },

    #[error("{0} is required in the configuration")]
    Missing(&'static str),

    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    pub telegram: Option<TelegramConfig>,
    pub slack: Option<SlackConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub openai_api_key: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilesConfig {
    #[serde(default)]
    pub credentials_file: String,
    #[serde(default)]
    pub token_file: String,
    #[serde(default)]
    pub prompts_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: i64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: default_interval_seconds() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationBackend {
    #[default]
    Telegram,
    /// Notifications are written with Telegram Markdown escapes; the Slack
    /// backend strips them, so `_` and `*` in message fields may still format.
    Slack,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub backend: NotificationBackend,
    #[serde(default)]
    pub important_email_template: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub channel_id: String,
}

fn default_interval_seconds() -> i64 {
    60
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> i64 {
    200
}

impl Config {
    /// Loads the YAML file at `path`, applies `INBOX_TRIAGE__*` environment
    /// overrides and validates the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let builder = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Yaml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            );

        Self::from_builder(builder, &path.display().to_string())
    }

    /// Parses and validates configuration from YAML text, without environment overrides.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let builder = ::config::Config::builder()
            .add_source(::config::File::from_str(yaml, ::config::FileFormat::Yaml));

        Self::from_builder(builder, "<inline>")
    }

    fn from_builder(
        builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
        origin: &str,
    ) -> Result<Self, ConfigError> {
        let config: Config = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|source| ConfigError::Load { path: origin.to_string(), source })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.files.credentials_file, "files.credentials_file")?;
        require(&self.files.token_file, "files.token_file")?;
        require(&self.files.prompts_file, "files.prompts_file")?;
        require(&self.credentials.openai_api_key, "credentials.openai_api_key")?;

        if self.polling.interval_seconds <= 0 {
            return Err(ConfigError::Invalid {
                field: "polling.interval_seconds",
                reason: format!("must be greater than 0 (got {})", self.polling.interval_seconds),
            });
        }

        if self.openai.max_tokens <= 0 || self.openai.max_tokens > i64::from(u32::MAX) {
            return Err(ConfigError::Invalid {
                field: "openai.max_tokens",
                reason: format!("must be a positive integer (got {})", self.openai.max_tokens),
            });
        }

        if !(0.0..=1.0).contains(&self.openai.temperature) {
            return Err(ConfigError::Invalid {
                field: "openai.temperature",
                reason: format!("must be between 0 and 1 (got {})", self.openai.temperature),
            });
        }

        require(&self.openai.endpoint, "openai.endpoint")?;
        require(&self.notification.important_email_template, "notification.important_email_template")?;

        let sites = FormatTemplate::new(&self.notification.important_email_template).sites();
        if sites != IMPORTANT_TEMPLATE_SITES {
            return Err(ConfigError::Invalid {
                field: "notification.important_email_template",
                reason: format!(
                    "must contain exactly {} %s placeholders (from, subject, preview, explanation), found {}",
                    IMPORTANT_TEMPLATE_SITES, sites
                ),
            });
        }

        match self.notification.backend {
            NotificationBackend::Telegram => {
                let telegram = self.telegram.as_ref().ok_or(ConfigError::Missing("telegram"))?;
                require(&telegram.bot_token, "telegram.bot_token")?;
                require(&telegram.chat_id, "telegram.chat_id")?;
            }
            NotificationBackend::Slack => {
                let slack = self.slack.as_ref().ok_or(ConfigError::Missing("slack"))?;
                require(&slack.bot_token, "slack.bot_token")?;
                require(&slack.channel_id, "slack.channel_id")?;
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_seconds.unsigned_abs())
    }

    pub fn max_tokens(&self) -> u32 {
        u32::try_from(self.openai.max_tokens).unwrap_or(u32::MAX)
    }
}

fn require(value: &str, field: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    Ok(())
}

/// Masks a secret for display, keeping only its last four characters.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}
