use std::sync::Arc;

use log::{debug, error, warn};

use super::openai::{CompletionRequest, LanguageModel};
use super::parser::{self, Verdict};
use crate::prompts::PromptConfig;

/// Decides whether a message is important by asking a language model.
///
/// Never fails: transport errors and empty responses resolve to an
/// unimportant verdict.
pub struct EmailClassifier {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<PromptConfig>,
    max_tokens: u32,
    temperature: f32,
}

impl EmailClassifier {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        prompts: Arc<PromptConfig>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        EmailClassifier { model, prompts, max_tokens, temperature }
    }

    pub async fn classify(&self, message_text: &str) -> Verdict {
        let request = CompletionRequest {
            system_message: self.prompts.system_message.clone(),
            user_prompt: self.prompts.user_prompt(message_text),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let candidates = match self.model.complete(&request).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("❌ Classification request failed: {}", e);
                return Verdict::unimportant(format!("request failed: {}", e));
            }
        };

        let Some(first) = candidates.first() else {
            warn!("No choices in completion response");
            return Verdict::unimportant("no choices");
        };

        let content = first.trim();
        debug!("Classifier reply: {}", content);

        parser::parse(content)
    }
}
