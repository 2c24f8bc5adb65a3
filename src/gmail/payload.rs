//! Wire types for the Gmail REST API.
//!
//! Only the fields this tool reads are modeled; everything else in the
//! provider's responses is ignored on deserialize.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A message as returned by `threads.get` and `messages.get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    /// Delivery timestamp in epoch milliseconds, serialized as a string.
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

impl Message {
    /// Provider delivery timestamp, or the epoch when the field is
    /// missing or malformed.
    pub fn received_at(&self) -> DateTime<Utc> {
        let millis = self
            .internal_date
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);
        DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// One node of the MIME tree: a leaf part with inline data, or a
/// multipart container with nested parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    /// base64url-encoded content. Absent on container parts.
    #[serde(default)]
    pub data: Option<String>,
}

/// Response from `threads.get`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Response from `messages.send`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

/// One label from `labels.list` or `labels.create`.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelList {
    #[serde(default)]
    pub labels: Vec<Label>,
}
