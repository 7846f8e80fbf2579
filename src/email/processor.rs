use std::sync::Arc;

use log::{debug, error, info, warn};

use super::common::{trash_notice, MessageStub, NotificationTemplate, RawMessage};
use super::mailbox::Mailbox;
use crate::classifier::{EmailClassifier, Verdict};
use crate::notifier::Notifier;

/// What happened to one message. Anything but `MarkedRead` and `Trashed`
/// leaves the message unread for the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Important: notified, then marked read.
    MarkedRead,
    /// Unimportant: notified, then trashed.
    Trashed,
    /// Classified only, no side effects.
    DryRun,
    /// Could not be fetched (gone or transport error).
    Unavailable,
    /// Notification was not delivered; mailbox untouched.
    NotificationFailed,
    /// Notification delivered but the mailbox action failed.
    ActionFailed,
}

/// Fetches, classifies and acts on a single message.
///
/// Notification always comes first; the mailbox is only changed once the
/// notification has been delivered.
pub struct MessageProcessor {
    mailbox: Arc<dyn Mailbox>,
    classifier: EmailClassifier,
    notifier: Arc<dyn Notifier>,
    template: NotificationTemplate,
    dry_run: bool,
}

impl MessageProcessor {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        classifier: EmailClassifier,
        notifier: Arc<dyn Notifier>,
        template: NotificationTemplate,
    ) -> Self {
        MessageProcessor {
            mailbox,
            classifier,
            notifier,
            template,
            dry_run: false,
        }
    }

    /// In dry-run mode verdicts are printed and nothing is sent or modified.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn process(&self, stub: &MessageStub) -> ProcessOutcome {
        debug!("Processing message ID: {}", stub.id);

        let message = match self.mailbox.get_full(&stub.id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                warn!("Message {} not found, skipping", stub.id);
                return ProcessOutcome::Unavailable;
            }
            Err(e) => {
                error!("❌ Could not retrieve message {}: {:#}", stub.id, e);
                return ProcessOutcome::Unavailable;
            }
        };

        let verdict = self.classifier.classify(&message.classification_input()).await;

        info!(
            "Message {} from '{}' ({}): important={} ({})",
            message.id,
            message.sender(),
            message.subject(),
            verdict.is_important,
            verdict.explanation
        );

        if self.dry_run {
            println!("📧 {} | From: {} | Subject: {}", message.id, message.sender(), message.subject());
            println!(
                "   {} {}",
                if verdict.is_important { "⭐ IMPORTANT:" } else { "🗑  unimportant:" },
                verdict.explanation
            );
            return ProcessOutcome::DryRun;
        }

        if verdict.is_important {
            self.handle_important(&message, &verdict).await
        } else {
            self.handle_unimportant(&message).await
        }
    }

    async fn handle_important(&self, message: &RawMessage, verdict: &Verdict) -> ProcessOutcome {
        let body = self.template.render(
            message.sender(),
            message.subject(),
            &message.snippet,
            &verdict.explanation,
        );

        if let Err(e) = self.notifier.send(&body).await {
            error!("❌ Failed to send notification for message {}: {:#}", message.id, e);
            return ProcessOutcome::NotificationFailed;
        }

        match self.mailbox.mark_read(&message.id).await {
            Ok(()) => {
                info!("✅ Notified and marked message {} as read", message.id);
                ProcessOutcome::MarkedRead
            }
            Err(e) => {
                warn!(
                    "⚠️  Notified about message {} but failed to mark it read (it will be notified again): {:#}",
                    message.id, e
                );
                ProcessOutcome::ActionFailed
            }
        }
    }

    async fn handle_unimportant(&self, message: &RawMessage) -> ProcessOutcome {
        let notice = trash_notice(message.sender(), message.subject());

        if let Err(e) = self.notifier.send(&notice).await {
            error!("❌ Failed to send trash notice for message {}: {:#}", message.id, e);
            return ProcessOutcome::NotificationFailed;
        }

        match self.mailbox.trash(&message.id).await {
            Ok(()) => {
                info!("{}", notice);
                ProcessOutcome::Trashed
            }
            Err(e) => {
                warn!(
                    "⚠️  Sent trash notice for message {} but failed to trash it (it will be retried): {:#}",
                    message.id, e
                );
                ProcessOutcome::ActionFailed
            }
        }
    }
}
