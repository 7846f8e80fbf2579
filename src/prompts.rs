use std::path::Path;

use serde::Deserialize;

use crate::config::ConfigError;
use crate::template::FormatTemplate;

#[derive(Debug, Deserialize)]
struct PromptsFile {
    email_classification: EmailClassificationPrompts,
}

#[derive(Debug, Deserialize)]
struct EmailClassificationPrompts {
    #[serde(default)]
    system_message: String,
    #[serde(default)]
    user_prompt_template: String,
}

/// Prompts used for every classification call. Loaded once at startup and
/// shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub system_message: String,
    user_prompt: FormatTemplate,
}

impl PromptConfig {
    pub fn new(system_message: impl Into<String>, user_prompt_template: &str) -> Result<Self, ConfigError> {
        let system_message = system_message.into();
        if system_message.trim().is_empty() {
            return Err(ConfigError::Missing("email_classification.system_message"));
        }
        if user_prompt_template.trim().is_empty() {
            return Err(ConfigError::Missing("email_classification.user_prompt_template"));
        }

        let user_prompt = FormatTemplate::new(user_prompt_template);
        if user_prompt.sites() != 1 {
            return Err(ConfigError::Invalid {
                field: "email_classification.user_prompt_template",
                reason: format!("must contain exactly one %s placeholder, found {}", user_prompt.sites()),
            });
        }

        Ok(PromptConfig { system_message, user_prompt })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let builder = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Yaml));

        Self::from_builder(builder, &path.display().to_string())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let builder = ::config::Config::builder()
            .add_source(::config::File::from_str(yaml, ::config::FileFormat::Yaml));

        Self::from_builder(builder, "<inline>")
    }

    fn from_builder(
        builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
        origin: &str,
    ) -> Result<Self, ConfigError> {
        let file: PromptsFile = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|source| ConfigError::Load { path: origin.to_string(), source })?;

        Self::new(
            file.email_classification.system_message,
            &file.email_classification.user_prompt_template,
        )
    }

    /// Substitutes the message text into the user prompt template.
    pub fn user_prompt(&self, message_text: &str) -> String {
        self.user_prompt.render(&[message_text])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_prompts_from_yaml() {
        let yaml = r#"
email_classification:
  system_message: "You triage email."
  user_prompt_template: "Classify this email:\n%s\nAnswer in JSON."
"#;
        let prompts = PromptConfig::from_yaml_str(yaml).expect("prompts should load");

        assert_eq!(prompts.system_message, "You triage email.");
        assert_eq!(
            prompts.user_prompt("From: a\nSubject: b\n\nbody"),
            "Classify this email:\nFrom: a\nSubject: b\n\nbody\nAnswer in JSON."
        );
    }

    #[test]
    fn test_template_without_site_rejected() {
        let err = PromptConfig::new("system", "no placeholder here").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_template_with_two_sites_rejected() {
        let err = PromptConfig::new("system", "%s and %s").unwrap_err();
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_empty_system_message_rejected() {
        let err = PromptConfig::new("  ", "%s").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("email_classification.system_message")));
    }
}
