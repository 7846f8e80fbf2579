pub mod common;
pub mod mailbox;
pub mod processor;
pub mod scanner;

// Re-export commonly used items
pub use common::{escape_markdown, trash_notice, MessageStub, NotificationTemplate, RawMessage};
pub use mailbox::Mailbox;
pub use processor::{MessageProcessor, ProcessOutcome};
pub use scanner::{CycleReport, InboxScanner};
