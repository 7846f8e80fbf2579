use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// Upper bound on a single chat-completion round trip.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else if err.is_decode() {
            CompletionError::Decode(err.to_string())
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

/// One chat-completion call: a system message plus one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_message: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Language-model collaborator. Returns the text of every candidate completion.
pub trait LanguageModel: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<Vec<String>, CompletionError>>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatTurn<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let base_url = normalize_base_url(&config.openai.endpoint);
        info!("Using chat-completion endpoint {} (model {})", base_url, config.openai.model);

        let http = reqwest::Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()?;

        Ok(OpenAiClient {
            http,
            endpoint: format!("{}/chat/completions", base_url),
            api_key: config.credentials.openai_api_key.clone(),
            model: config.openai.model.clone(),
        })
    }

    async fn create_chat_completion(&self, request: &CompletionRequest) -> Result<Vec<String>, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatTurn { role: "system", content: &request.system_message },
                ChatTurn { role: "user", content: &request.user_prompt },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!("POST {} ({} prompt bytes)", self.endpoint, request.user_prompt.len());

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status: status.as_u16(), body });
        }

        let parsed: ChatResponse = response.json().await?;

        Ok(parsed
            .choices
            .into_iter()
            .map(|choice| choice.message.content.unwrap_or_default())
            .collect())
    }
}

impl LanguageModel for OpenAiClient {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<Vec<String>, CompletionError>> {
        self.create_chat_completion(request).boxed()
    }
}

/// Normalises a configured endpoint to an API base ending in `/v1`.
///
/// `https://host` and `https://host/` become `https://host/v1`; a full
/// endpoint such as `https://host/v1/chat/completions` is cut back to
/// `https://host/v1`.
pub fn normalize_base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.ends_with("/v1") {
        return trimmed.to_string();
    }
    if let Some(index) = trimmed.find("/v1/") {
        return trimmed[..index + 3].to_string();
    }
    format!("{}/v1", trimmed)
}
