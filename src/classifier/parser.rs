use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde_json::Value;

/// Explanation used when an "important" verdict carries no text of its own.
pub const IMPORTANT_FALLBACK: &str = "classified as important";

/// Explanation used when an "unimportant" verdict carries no text of its own.
pub const UNIMPORTANT_FALLBACK: &str = "classified as unimportant";

/// Substrings that flag a free-text reply as important. Matched anywhere,
/// so "unimportant" counts as a hit.
const IMPORTANCE_TOKENS: [&str; 3] = ["true", "important", "yes"];

/// Brace-delimited object without nested braces.
const OBJECT_PATTERN: &str = r"\{[^{}]*\}";

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_important: bool,
    pub explanation: String,
}

impl Verdict {
    /// Builds a verdict, substituting the fallback explanation when `explanation` is blank.
    pub fn new(is_important: bool, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        let explanation = if explanation.trim().is_empty() {
            let fallback = if is_important { IMPORTANT_FALLBACK } else { UNIMPORTANT_FALLBACK };
            fallback.to_string()
        } else {
            explanation
        };

        Verdict { is_important, explanation }
    }

    pub fn unimportant(explanation: impl Into<String>) -> Self {
        Self::new(false, explanation)
    }
}

fn object_regex() -> &'static Regex {
    static OBJECT_RE: OnceLock<Regex> = OnceLock::new();
    OBJECT_RE.get_or_init(|| Regex::new(OBJECT_PATTERN).expect("object pattern is a valid regex"))
}

/// Turns a language-model reply into a verdict. Never fails.
///
/// Tried in order:
/// 1. the first `{...}` object in the text, decoded as JSON with optional
///    `important` and `explanation` fields;
/// 2. a case-insensitive substring search for `true`, `important` or `yes`;
/// 3. unimportant.
///
/// The heuristic tiers use the first line of the reply as explanation.
pub fn parse(raw_text: &str) -> Verdict {
    if let Some(candidate) = object_regex().find(raw_text) {
        match decode_object(candidate.as_str()) {
            Some(verdict) => return verdict,
            None => debug!("Reply object is not valid JSON, falling back to keywords: {}", candidate.as_str()),
        }
    }

    let lower = raw_text.to_lowercase();
    let is_important = IMPORTANCE_TOKENS.iter().any(|token| lower.contains(token));

    Verdict::new(is_important, first_line(raw_text))
}

fn decode_object(candidate: &str) -> Option<Verdict> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;

    let is_important = object.get("important").map(truthy).unwrap_or(false);
    let explanation = match object.get("explanation") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Some(Verdict::new(is_important, explanation))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}
