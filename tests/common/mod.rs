//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::future::{self, BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use inbox_triage::classifier::{CompletionError, CompletionRequest, EmailClassifier, LanguageModel};
use inbox_triage::email::{Mailbox, MessageProcessor, MessageStub, NotificationTemplate, RawMessage};
use inbox_triage::notifier::Notifier;
use inbox_triage::prompts::PromptConfig;

pub const TEMPLATE: &str = "⭐ *Important* from %s\nSubject: %s\n%s\n_Why_: %s";

/// Ordered record of side effects across all fakes.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn message(id: &str, from: &str, subject: &str, snippet: &str) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        snippet: snippet.to_string(),
        headers: vec![
            ("From".to_string(), from.to_string()),
            ("Subject".to_string(), subject.to_string()),
        ],
    }
}

#[derive(Default)]
struct MailboxState {
    messages: HashMap<String, RawMessage>,
    order: Vec<String>,
    unread: HashSet<String>,
    trashed: BTreeSet<String>,
    list_calls: usize,
    fail_list: bool,
    fail_get: HashSet<String>,
    panic_on_get: HashSet<String>,
    fail_mark_read: bool,
    fail_trash: bool,
    cancel_after_lists: Option<(usize, CancellationToken)>,
    cancel_on_get: Option<(String, CancellationToken)>,
}

pub struct FakeMailbox {
    state: Mutex<MailboxState>,
    journal: Journal,
}

impl FakeMailbox {
    pub fn new(journal: Journal, messages: Vec<RawMessage>) -> Self {
        let mut state = MailboxState::default();
        for msg in messages {
            state.order.push(msg.id.clone());
            state.unread.insert(msg.id.clone());
            state.messages.insert(msg.id.clone(), msg);
        }
        FakeMailbox { state: Mutex::new(state), journal }
    }

    /// Listed as unread but gone when fetched.
    pub fn add_vanished(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.order.push(id.to_string());
        state.unread.insert(id.to_string());
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_get(&self, id: &str) {
        self.state.lock().unwrap().fail_get.insert(id.to_string());
    }

    pub fn panic_on_get(&self, id: &str) {
        self.state.lock().unwrap().panic_on_get.insert(id.to_string());
    }

    pub fn fail_mark_read(&self) {
        self.state.lock().unwrap().fail_mark_read = true;
    }

    pub fn fail_trash(&self) {
        self.state.lock().unwrap().fail_trash = true;
    }

    pub fn cancel_after_lists(&self, lists: usize, token: CancellationToken) {
        self.state.lock().unwrap().cancel_after_lists = Some((lists, token));
    }

    pub fn cancel_on_get(&self, id: &str, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on_get = Some((id.to_string(), token));
    }

    pub fn is_unread(&self, id: &str) -> bool {
        self.state.lock().unwrap().unread.contains(id)
    }

    pub fn is_trashed(&self, id: &str) -> bool {
        self.state.lock().unwrap().trashed.contains(id)
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

impl Mailbox for FakeMailbox {
    fn list_unread(&self) -> BoxFuture<'_, Result<Vec<MessageStub>>> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.list_calls += 1;
            if let Some((after, token)) = &state.cancel_after_lists {
                if state.list_calls >= *after {
                    token.cancel();
                }
            }
            if state.fail_list {
                Err(anyhow::anyhow!("connection reset"))
            } else {
                Ok(state
                    .order
                    .iter()
                    .filter(|id| state.unread.contains(*id))
                    .map(|id| MessageStub::new(id.as_str()))
                    .collect())
            }
        };
        future::ready(result).boxed()
    }

    fn get_full<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<RawMessage>>> {
        self.record(format!("get:{}", id));
        let (should_panic, result) = {
            let state = self.state.lock().unwrap();
            if let Some((target, token)) = &state.cancel_on_get {
                if target == id {
                    token.cancel();
                }
            }
            let result = if state.fail_get.contains(id) {
                Err(anyhow::anyhow!("503 backend error"))
            } else {
                Ok(state.messages.get(id).cloned())
            };
            (state.panic_on_get.contains(id), result)
        };
        if should_panic {
            panic!("malformed payload for message {}", id);
        }
        future::ready(result).boxed()
    }

    fn mark_read<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        self.record(format!("mark_read:{}", id));
        let result = {
            let mut state = self.state.lock().unwrap();
            if state.fail_mark_read {
                Err(anyhow::anyhow!("quota exceeded"))
            } else {
                state.unread.remove(id);
                Ok(())
            }
        };
        future::ready(result).boxed()
    }

    fn trash<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        self.record(format!("trash:{}", id));
        let result = {
            let mut state = self.state.lock().unwrap();
            if state.fail_trash {
                Err(anyhow::anyhow!("quota exceeded"))
            } else {
                state.unread.remove(id);
                state.trashed.insert(id.to_string());
                Ok(())
            }
        };
        future::ready(result).boxed()
    }
}

type Responder = dyn Fn(&CompletionRequest) -> Result<Vec<String>, CompletionError> + Send + Sync;

/// Language model answering from a closure and remembering every request.
pub struct ScriptedModel {
    respond: Box<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<Vec<String>, CompletionError> + Send + Sync + 'static,
    {
        ScriptedModel { respond: Box::new(respond), requests: Mutex::new(Vec::new()) }
    }

    pub fn replying(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(vec![reply.clone()]))
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<Vec<String>, CompletionError>> {
        self.requests.lock().unwrap().push(request.clone());
        future::ready((self.respond)(request)).boxed()
    }
}

pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
    journal: Journal,
}

impl RecordingNotifier {
    pub fn new(journal: Journal) -> Self {
        RecordingNotifier { sent: Mutex::new(Vec::new()), fail: false, journal }
    }

    pub fn failing(journal: Journal) -> Self {
        RecordingNotifier { sent: Mutex::new(Vec::new()), fail: true, journal }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        self.journal.lock().unwrap().push("notify".to_string());
        let result = if self.fail {
            Err(anyhow::anyhow!("telegram API error: 502"))
        } else {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        };
        future::ready(result).boxed()
    }
}

pub fn prompts() -> Arc<PromptConfig> {
    Arc::new(
        PromptConfig::new(
            "You decide whether an email deserves the user's attention.",
            "Reply with JSON {\"important\": bool, \"explanation\": string}.\n\n%s",
        )
        .unwrap(),
    )
}

pub fn processor(
    mailbox: Arc<FakeMailbox>,
    model: Arc<ScriptedModel>,
    notifier: Arc<RecordingNotifier>,
) -> MessageProcessor {
    let classifier = EmailClassifier::new(model, prompts(), 200, 0.0);
    MessageProcessor::new(mailbox, classifier, notifier, NotificationTemplate::new(TEMPLATE))
}

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}
