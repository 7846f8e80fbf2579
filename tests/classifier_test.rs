mod common;

use std::sync::Arc;

use inbox_triage::classifier::{CompletionError, EmailClassifier, Verdict};

use common::{prompts, ScriptedModel};

fn classifier(model: Arc<ScriptedModel>) -> EmailClassifier {
    EmailClassifier::new(model, prompts(), 150, 0.3)
}

#[tokio::test]
async fn test_timeout_becomes_unimportant_verdict() {
    let model = Arc::new(ScriptedModel::new(|_| Err(CompletionError::Timeout)));

    let verdict = classifier(model).classify("From: a\nSubject: b\n\nc").await;

    assert_eq!(verdict, Verdict { is_important: false, explanation: "request failed: timeout".to_string() });
}

#[tokio::test]
async fn test_http_error_becomes_unimportant_verdict() {
    let model = Arc::new(ScriptedModel::new(|_| {
        Err(CompletionError::Status { status: 429, body: "rate limited".to_string() })
    }));

    let verdict = classifier(model).classify("text").await;

    assert!(!verdict.is_important);
    assert_eq!(verdict.explanation, "request failed: HTTP 429: rate limited");
}

#[tokio::test]
async fn test_no_choices() {
    let model = Arc::new(ScriptedModel::new(|_| Ok(Vec::new())));

    let verdict = classifier(model).classify("text").await;

    assert_eq!(verdict, Verdict { is_important: false, explanation: "no choices".to_string() });
}

#[tokio::test]
async fn test_first_choice_is_trimmed_and_parsed() {
    let model = Arc::new(ScriptedModel::new(|_| {
        Ok(vec![
            "   \n  Yes, this one matters\nbecause of the deadline  ".to_string(),
            r#"{"important": false, "explanation": "ignored"}"#.to_string(),
        ])
    }));

    let verdict = classifier(model).classify("text").await;

    assert!(verdict.is_important);
    assert_eq!(verdict.explanation, "Yes, this one matters");
}

#[tokio::test]
async fn test_request_carries_prompt_and_limits() {
    let model = Arc::new(ScriptedModel::replying(r#"{"important": true, "explanation": "x"}"#));

    let verdict = classifier(model.clone()).classify("From: a\nSubject: b\n\nc").await;

    assert!(verdict.is_important);
    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].max_tokens, 150);
    assert_eq!(requests[0].temperature, 0.3);
    assert_eq!(
        requests[0].user_prompt,
        "Reply with JSON {\"important\": bool, \"explanation\": string}.\n\nFrom: a\nSubject: b\n\nc"
    );
}
