//! Gmail REST client.
//!
//! Thin wrapper over the `users.me` endpoints this tool needs: send,
//! label lookup/creation, thread listing, and full-message fetch. Sends
//! go through the caller-supplied retry policy; everything else is a
//! single attempt whose failure the caller handles.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use tracing::{debug, info, warn};

use super::auth::Authenticator;
use super::payload::{Label, LabelList, Message, SendResponse, Thread};
use super::{MailProvider, SentMessage};
use crate::error::GmailError;
use crate::retry::RetryPolicy;

pub struct GmailClient {
    client: reqwest::Client,
    auth: Authenticator,
    retry: RetryPolicy,
}

impl GmailClient {
    pub fn new(credentials_path: PathBuf, token_path: PathBuf, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::new();
        let auth = Authenticator::new(credentials_path, token_path, client.clone());
        Self {
            client,
            auth,
            retry,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("https://gmail.googleapis.com/gmail/v1/users/me/{path}")
    }

    /// One send attempt: fresh token, POST, typed response.
    async fn try_send(&self, raw: &str) -> Result<SentMessage, GmailError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(self.api_url("messages/send"))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;
        let response = check(response).await?;
        let sent: SendResponse = response.json().await?;
        Ok(SentMessage {
            id: sent.id,
            thread_id: sent.thread_id,
        })
    }

    async fn apply_label(&self, message_id: &str, label_id: &str) -> Result<(), GmailError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(self.api_url(&format!("messages/{message_id}/modify")))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "addLabelIds": [label_id] }))
            .send()
            .await?;
        match check(response).await {
            Ok(_) => Ok(()),
            // The message went out; a scope problem here gets its own
            // remediation instead of the generic one.
            Err(GmailError::InsufficientScopes) => Err(GmailError::LabelNotApplied),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        sender_header: &str,
        label_id: Option<&str>,
    ) -> Result<SentMessage, GmailError> {
        let raw = build_raw_message(sender_header, to, subject, body)?;

        let mut attempt = 0;
        let sent = loop {
            match self.try_send(&raw).await {
                Ok(sent) => break sent,
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= self.retry.max_attempts {
                        return Err(e);
                    }
                    let delay = self.retry.delay_before(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient send failure, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };
        info!(to, message_id = %sent.id, "Message sent");

        if let Some(label_id) = label_id {
            self.apply_label(&sent.id, label_id).await?;
        }

        Ok(sent)
    }

    async fn list_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>, GmailError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(self.api_url(&format!("threads/{thread_id}")))
            .bearer_auth(&token)
            .send()
            .await?;
        let response = check(response).await?;
        let thread: Thread = response.json().await?;
        Ok(thread.messages)
    }

    async fn get_message(&self, message_id: &str) -> Result<Message, GmailError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(self.api_url(&format!("messages/{message_id}")))
            .query(&[("format", "full")])
            .bearer_auth(&token)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    async fn ensure_label(&self, name: &str) -> Result<String, GmailError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(self.api_url("labels"))
            .bearer_auth(&token)
            .send()
            .await?;
        let response = check(response).await?;
        let labels: LabelList = response.json().await?;

        if let Some(label) = labels.labels.into_iter().find(|l| l.name == name) {
            debug!(name, id = %label.id, "Label already exists");
            return Ok(label.id);
        }

        let response = self
            .client
            .post(self.api_url("labels"))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "name": name,
                "labelListVisibility": "labelShow",
                "messageListVisibility": "show",
            }))
            .send()
            .await?;
        let response = check(response).await?;
        let created: Label = response.json().await?;
        info!(name, id = %created.id, "Label created");
        Ok(created.id)
    }
}

/// Build the RFC 822 message and encode it the way the send endpoint
/// expects (base64url of the full message).
fn build_raw_message(
    sender_header: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<String, GmailError> {
    let from = sender_header
        .parse()
        .map_err(|e| GmailError::InvalidMessage {
            reason: format!("From header {sender_header:?}: {e}"),
        })?;
    let to = to.parse().map_err(|e| GmailError::InvalidMessage {
        reason: format!("recipient {to:?}: {e}"),
    })?;
    let message = lettre::Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| GmailError::InvalidMessage {
            reason: e.to_string(),
        })?;
    Ok(URL_SAFE.encode(message.formatted()))
}

/// Pass successful responses through; turn everything else into the
/// matching error variant.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, GmailError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_api_error(status.as_u16(), &body))
}

/// Map an error response onto the taxonomy. The two auth-shaped
/// failures are recognized by the reason strings Google embeds in the
/// body; everything else keeps its status and message.
fn classify_api_error(status: u16, body: &str) -> GmailError {
    if body.contains("accessNotConfigured") || body.contains("has not been used in project") {
        return GmailError::ApiDisabled;
    }
    if body.contains("insufficientPermissions") || body.contains("Insufficient Permission") {
        return GmailError::InsufficientScopes;
    }
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string());
    GmailError::Api { status, message }
}

// ── Tests ───────────────────────────────────────────────────────────
