//! Gmail collaborator — REST client, OAuth handling, wire types.

pub mod auth;
pub mod client;
pub mod payload;

pub use auth::Authenticator;
pub use client::GmailClient;

use async_trait::async_trait;

use crate::error::GmailError;
use payload::Message;

/// Outcome of a successful send.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub id: String,
    pub thread_id: String,
}

/// The narrow mail-provider capability the campaign and the reply sweep
/// are written against.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Send a plain-text message and apply `label_id` to it when given.
    /// Returns the provider-assigned message and thread ids.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        sender_header: &str,
        label_id: Option<&str>,
    ) -> Result<SentMessage, GmailError>;

    /// All messages in a conversation, metadata-level.
    async fn list_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>, GmailError>;

    /// One message with its full payload tree.
    async fn get_message(&self, message_id: &str) -> Result<Message, GmailError>;

    /// Find or create a label, returning its id.
    async fn ensure_label(&self, name: &str) -> Result<String, GmailError>;
}
