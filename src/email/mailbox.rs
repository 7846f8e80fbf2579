use anyhow::Result;
use futures::future::BoxFuture;

use super::common::{MessageStub, RawMessage};

/// Mailbox collaborator. Every call except `list_unread` is keyed by
/// message id and safe to repeat.
pub trait Mailbox: Send + Sync {
    /// Unread messages currently in the inbox.
    fn list_unread(&self) -> BoxFuture<'_, Result<Vec<MessageStub>>>;

    /// Full message, or `None` if it no longer exists.
    fn get_full<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<RawMessage>>>;

    fn mark_read<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;

    fn trash<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;
}
