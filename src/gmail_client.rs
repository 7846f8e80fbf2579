use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use google_gmail1::api::{ModifyMessageRequest, Scope};
use google_gmail1::client::GetToken;
use google_gmail1::{hyper, hyper_rustls, oauth2, Gmail};
use log::{debug, info};

use crate::config::FilesConfig;
use crate::email::{Mailbox, MessageStub, RawMessage};

const USER_ID: &str = "me";
const UNREAD_QUERY: &str = "is:unread in:inbox";
const UNREAD_LABEL: &str = "UNREAD";

/// Upper bound on any single Gmail API call.
pub const GMAIL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GmailClient {
    hub: Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
}

impl GmailClient {
    pub async fn new(files: &FilesConfig) -> Result<Self> {
        info!("Connecting to Gmail API via OAuth2");

        // Read OAuth2 client credentials from file
        let secret = oauth2::read_application_secret(&files.credentials_file)
            .await
            .with_context(|| format!("Unable to read OAuth2 client credentials file {}", files.credentials_file))?;

        // Tokens are cached in the token file and refreshed by the authenticator
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&files.token_file)
        .build()
        .await
        .context("Unable to create OAuth2 authenticator")?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper::Client::builder().build(connector);
        let hub = Gmail::new(client, auth);

        info!("✅ Gmail API client ready");

        Ok(GmailClient { hub })
    }

    /// Obtains a token for the modify scope, running the interactive flow
    /// when the token file holds no usable token.
    pub async fn authorize(&self) -> Result<()> {
        info!("Requesting Gmail OAuth2 token");

        request_token(self.hub.auth.as_ref()).await?;

        info!("✅ Gmail authorization complete");
        Ok(())
    }

    pub async fn list_unread_messages(&self) -> Result<Vec<MessageStub>> {
        debug!("Search criteria: {}", UNREAD_QUERY);

        let mut stubs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut call = self
                .hub
                .users()
                .messages_list(USER_ID)
                .q(UNREAD_QUERY)
                .add_scope(Scope::Modify);
            if let Some(token) = &page_token {
                call = call.page_token(token);
            }

            let (_, page) = with_timeout("messages.list", call.doit())
                .await?
                .context("Error searching for unread messages")?;

            stubs.extend(
                page.messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|msg| msg.id)
                    .map(MessageStub::new),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Found {} unread message(s)", stubs.len());
        Ok(stubs)
    }

    pub async fn fetch_message_full(&self, message_id: &str) -> Result<Option<RawMessage>> {
        debug!("Retrieving message {} (format=full)", message_id);

        let call = self
            .hub
            .users()
            .messages_get(USER_ID, message_id)
            .format("full")
            .add_scope(Scope::Modify);

        let message = match with_timeout("messages.get", call.doit()).await? {
            Ok((_, message)) => message,
            Err(e) if is_not_found(&e) => {
                debug!("Message {} no longer exists", message_id);
                return Ok(None);
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Unable to retrieve message")),
        };

        let headers = message
            .payload
            .and_then(|payload| payload.headers)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|header| match (header.name, header.value) {
                (Some(name), Some(value)) => Some((name, value)),
                _ => None,
            })
            .collect();

        Ok(Some(RawMessage {
            id: message.id.unwrap_or_else(|| message_id.to_string()),
            snippet: message.snippet.unwrap_or_default(),
            headers,
        }))
    }

    pub async fn mark_message_as_read(&self, message_id: &str) -> Result<()> {
        let request = ModifyMessageRequest {
            remove_label_ids: Some(vec![UNREAD_LABEL.to_string()]),
            ..Default::default()
        };

        let call = self
            .hub
            .users()
            .messages_modify(request, USER_ID, message_id)
            .add_scope(Scope::Modify);

        with_timeout("messages.modify", call.doit())
            .await?
            .context("Unable to remove UNREAD label")?;

        debug!("Message {} marked as read", message_id);
        Ok(())
    }

    pub async fn trash_message(&self, message_id: &str) -> Result<()> {
        let call = self
            .hub
            .users()
            .messages_trash(USER_ID, message_id)
            .add_scope(Scope::Modify);

        with_timeout("messages.trash", call.doit())
            .await?
            .context("Unable to move message to trash")?;

        debug!("Message {} moved to trash", message_id);
        Ok(())
    }
}

impl Mailbox for GmailClient {
    fn list_unread(&self) -> BoxFuture<'_, Result<Vec<MessageStub>>> {
        self.list_unread_messages().boxed()
    }

    fn get_full<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<RawMessage>>> {
        self.fetch_message_full(id).boxed()
    }

    fn mark_read<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        self.mark_message_as_read(id).boxed()
    }

    fn trash<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        self.trash_message(id).boxed()
    }
}

/// Asks the authenticator for a modify-scope token. Not bounded by
/// [`GMAIL_CALL_TIMEOUT`]: the first run waits for the operator to finish the consent flow.
async fn request_token(auth: &dyn GetToken) -> Result<()> {
    let token = auth
        .get_token(&[Scope::Modify.as_ref()])
        .await
        .map_err(|e| anyhow::anyhow!("Unable to obtain OAuth2 token: {}", e))?;

    if token.is_none() {
        anyhow::bail!("OAuth2 flow completed without a token");
    }
    Ok(())
}

async fn with_timeout<F: Future>(operation: &str, call: F) -> Result<F::Output> {
    tokio::time::timeout(GMAIL_CALL_TIMEOUT, call)
        .await
        .map_err(|_| anyhow::anyhow!("Gmail {} timed out after {:?}", operation, GMAIL_CALL_TIMEOUT))
}

fn is_not_found(err: &google_gmail1::Error) -> bool {
    match err {
        google_gmail1::Error::BadRequest(body) => {
            body.pointer("/error/code").and_then(|code| code.as_u64()) == Some(404)
        }
        google_gmail1::Error::Failure(response) => response.status() == hyper::StatusCode::NOT_FOUND,
        _ => false,
    }
}
