/// Common structures and utilities for message processing
use crate::template::FormatTemplate;

/// Entry of the unread listing; only the id is needed to fetch the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStub {
    pub id: String,
}

impl MessageStub {
    pub fn new(id: impl Into<String>) -> Self {
        MessageStub { id: id.into() }
    }
}

/// Message fetched from the mailbox: id, preview snippet and headers.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub id: String,
    pub snippet: String,
    pub headers: Vec<(String, String)>,
}

impl RawMessage {
    /// Value of the first header named `name` (case-insensitive), or `""`.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    pub fn sender(&self) -> &str {
        self.header("From")
    }

    pub fn subject(&self) -> &str {
        self.header("Subject")
    }

    /// Text handed to the classifier: sender and subject lines, a blank line, the snippet.
    pub fn classification_input(&self) -> String {
        format!("From: {}\nSubject: {}\n\n{}", self.sender(), self.subject(), self.snippet)
    }
}

/// Backslash-escapes `_`, `*`, `[` and `]` for Markdown chat messages.
///
/// Not idempotent: every pass adds one more backslash before each of those characters.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Notification sent for important messages; sites are filled with
/// from, subject, preview and explanation, each Markdown-escaped.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    template: FormatTemplate,
}

impl NotificationTemplate {
    pub fn new(raw: &str) -> Self {
        NotificationTemplate { template: FormatTemplate::new(raw) }
    }

    pub fn render(&self, from: &str, subject: &str, preview: &str, explanation: &str) -> String {
        let fields = [
            escape_markdown(from),
            escape_markdown(subject),
            escape_markdown(preview),
            escape_markdown(explanation),
        ];
        let values: Vec<&str> = fields.iter().map(String::as_str).collect();
        self.template.render(&values)
    }
}

/// Fixed notice sent before an unimportant message is trashed. Not escaped.
pub fn trash_notice(from: &str, subject: &str) -> String {
    format!("🗑 Trashed message from {} subject={}", from, subject)
}
