use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use super::mailbox::Mailbox;
use super::processor::{MessageProcessor, ProcessOutcome};

/// Per-cycle counters of the inbox scanner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub marked_read: usize,
    pub trashed: usize,
    pub dry_run: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn new(listed: usize) -> Self {
        Self { listed, ..Self::default() }
    }

    pub fn record(&mut self, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::MarkedRead => self.marked_read += 1,
            ProcessOutcome::Trashed => self.trashed += 1,
            ProcessOutcome::DryRun => self.dry_run += 1,
            ProcessOutcome::Unavailable => self.skipped += 1,
            ProcessOutcome::NotificationFailed | ProcessOutcome::ActionFailed => self.failed += 1,
        }
    }

    /// Messages that went through processing, whatever the outcome.
    pub fn handled(&self) -> usize {
        self.marked_read + self.trashed + self.dry_run + self.skipped + self.failed
    }
}

/// Poll loop: list unread messages, process them one by one, sleep, repeat.
///
/// Cancellation is only observed between messages and while sleeping, so a
/// message is never abandoned half-way.
pub struct InboxScanner {
    mailbox: Arc<dyn Mailbox>,
    processor: MessageProcessor,
    poll_interval: Duration,
    limit: Option<NonZeroUsize>,
}

impl InboxScanner {
    pub fn new(mailbox: Arc<dyn Mailbox>, processor: MessageProcessor, poll_interval: Duration) -> Self {
        InboxScanner {
            mailbox,
            processor,
            poll_interval,
            limit: None,
        }
    }

    /// Caps the number of messages handled per cycle; the rest wait for later cycles.
    pub fn with_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.limit = limit;
        self
    }

    /// Runs cycles until `shutdown` is cancelled. Returns the number of completed cycles.
    pub async fn run(&self, shutdown: CancellationToken) -> usize {
        info!("🔄 Agent started, polling for unread messages every {}s", self.poll_interval.as_secs());

        let mut cycles = 0;
        while !shutdown.is_cancelled() {
            self.run_cycle(&shutdown).await;
            cycles += 1;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("🛑 Poll loop stopped after {} cycle(s)", cycles);
        cycles
    }

    /// One pass over the currently unread messages.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> CycleReport {
        let stubs = match self.mailbox.list_unread().await {
            Ok(stubs) => stubs,
            Err(e) => {
                error!("❌ Unable to fetch unread messages: {:#}", e);
                Vec::new()
            }
        };

        if stubs.is_empty() {
            info!("No unread messages.");
            return CycleReport::default();
        }

        let mut report = CycleReport::new(stubs.len());
        let batch = match self.limit {
            Some(limit) if limit.get() < stubs.len() => {
                info!("Limiting to {} of {} unread message(s)", limit, stubs.len());
                &stubs[..limit.get()]
            }
            _ => &stubs[..],
        };

        info!("Processing {} unread message(s)...", batch.len());

        for (index, stub) in batch.iter().enumerate() {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, leaving {} message(s) for later", batch.len() - index);
                break;
            }

            debug!("Message {}/{} (ID: {})", index + 1, batch.len(), stub.id);

            match AssertUnwindSafe(self.processor.process(stub)).catch_unwind().await {
                Ok(outcome) => report.record(outcome),
                Err(panic) => {
                    error!(
                        "❌ Unexpected failure while processing message {}: {}",
                        stub.id,
                        panic_message(panic.as_ref())
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            "Cycle complete: {} listed, {} marked read, {} trashed, {} dry-run, {} skipped, {} failed",
            report.listed, report.marked_read, report.trashed, report.dry_run, report.skipped, report.failed
        );

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
