// Library exports for the inbox-triage crate
// This allows tests and the binary to use the modules

pub mod classifier;
pub mod config;
pub mod email;
pub mod gmail_client;
pub mod notifier;
pub mod prompts;
pub mod template;
