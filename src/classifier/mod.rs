/// Language-model classification of incoming mail
pub mod email_classifier;
pub mod openai;
pub mod parser;

pub use email_classifier::EmailClassifier;
pub use openai::{CompletionError, CompletionRequest, LanguageModel, OpenAiClient};
pub use parser::{parse, Verdict};
