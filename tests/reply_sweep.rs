//! Integration tests for the reply sweep.
//!
//! Each test seeds the tracking store, wires a stub mail provider with
//! canned thread content, and runs the real sweep over both.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

use outreach::error::GmailError;
use outreach::gmail::payload::{Header, Message, MessagePart, PartBody};
use outreach::gmail::{MailProvider, SentMessage};
use outreach::replies::check_for_new_replies;
use outreach::store::{Database, SentEmail, TrackingStore};

const PROSPECT: &str = "jane@co.com";
const RECEIVED_MILLIS: i64 = 1_704_103_200_000;

/// Serves canned thread content instead of talking to Gmail.
#[derive(Default)]
struct StubProvider {
    threads: HashMap<String, Vec<Message>>,
    full: HashMap<String, Message>,
    fail_threads: Vec<String>,
}

impl StubProvider {
    fn with_thread(mut self, thread_id: &str, messages: Vec<Message>) -> Self {
        for message in &messages {
            self.full.insert(message.id.clone(), message.clone());
        }
        self.threads.insert(thread_id.to_string(), messages);
        self
    }

    fn with_failing_thread(mut self, thread_id: &str) -> Self {
        self.fail_threads.push(thread_id.to_string());
        self
    }
}

#[async_trait]
impl MailProvider for StubProvider {
    async fn send(
        &self,
        _to: &str,
        _subject: &str,
        _body: &str,
        _sender_header: &str,
        _label_id: Option<&str>,
    ) -> Result<SentMessage, GmailError> {
        unimplemented!("not used in sweep tests")
    }

    async fn list_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>, GmailError> {
        if self.fail_threads.iter().any(|t| t == thread_id) {
            return Err(GmailError::Api {
                status: 500,
                message: "backend error".into(),
            });
        }
        Ok(self.threads.get(thread_id).cloned().unwrap_or_default())
    }

    async fn get_message(&self, message_id: &str) -> Result<Message, GmailError> {
        self.full.get(message_id).cloned().ok_or(GmailError::Api {
            status: 404,
            message: "not found".into(),
        })
    }

    async fn ensure_label(&self, _name: &str) -> Result<String, GmailError> {
        unimplemented!("not used in sweep tests")
    }
}

fn message(id: &str, thread_id: &str, from: &str, body_text: Option<&str>) -> Message {
    Message {
        id: id.into(),
        thread_id: thread_id.into(),
        internal_date: Some(RECEIVED_MILLIS.to_string()),
        payload: Some(MessagePart {
            mime_type: "text/plain".into(),
            headers: vec![Header {
                name: "From".into(),
                value: from.into(),
            }],
            body: PartBody {
                data: body_text.map(|text| URL_SAFE_NO_PAD.encode(text)),
            },
            parts: vec![],
        }),
    }
}

fn store() -> TrackingStore {
    TrackingStore::new(Arc::new(Database::open_in_memory().unwrap()))
}

fn seed_sent(store: &TrackingStore, thread_id: &str, message_id: &str) -> i64 {
    store
        .save_sent_email(&SentEmail {
            id: None,
            thread_id: thread_id.into(),
            message_id: message_id.into(),
            prospect_email: PROSPECT.into(),
            prospect_name: "Jane Doe".into(),
            company: "Acme".into(),
            subject: "Acme x Workflow Automation?".into(),
            body: "Hi Jane,".into(),
            sent_at: Utc::now(),
            label: "cold-outreach".into(),
        })
        .unwrap()
}

#[tokio::test]
async fn first_sweep_records_reply_second_sweep_records_nothing() {
    let store = store();
    let sent_id = seed_sent(&store, "t1", "m-ours");

    let reply_text = "Sounds interesting!\n\nOn Mon, 1 Jan 2024 at 09:00, Alex Doe \
                      <alex@example.com> wrote:\n> Hi Jane,";
    let provider = StubProvider::default().with_thread(
        "t1",
        vec![
            message("m-ours", "t1", "Alex Doe <alex@example.com>", Some("Hi Jane,")),
            message("m-reply", "t1", "Jane Doe <jane@co.com>", Some(reply_text)),
        ],
    );

    let new_replies = check_for_new_replies(&store, &provider).await.unwrap();
    assert_eq!(new_replies.len(), 1);
    let reply = &new_replies[0];
    assert_eq!(reply.sent_email_id, sent_id);
    assert_eq!(reply.message_id, "m-reply");
    assert_eq!(reply.from_email, PROSPECT);
    assert_eq!(reply.reply_content, "Sounds interesting!");
    assert!(!reply.processed);
    assert_eq!(
        reply.received_at,
        DateTime::from_timestamp_millis(RECEIVED_MILLIS).unwrap()
    );
    assert!(reply.id.is_some());

    // Same provider responses again: nothing new, nothing duplicated.
    let second = check_for_new_replies(&store, &provider).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(store.get_all_replies().unwrap().len(), 1);
}

#[tokio::test]
async fn our_own_messages_never_classify_as_replies() {
    let store = store();
    seed_sent(&store, "t1", "m-ours");

    let provider = StubProvider::default().with_thread(
        "t1",
        vec![message("m-ours", "t1", "Alex Doe <alex@example.com>", Some("Hi Jane,"))],
    );

    let new_replies = check_for_new_replies(&store, &provider).await.unwrap();
    assert!(new_replies.is_empty());
    assert!(store.get_all_replies().unwrap().is_empty());
}

#[tokio::test]
async fn fully_quoted_replies_are_not_recorded() {
    let store = store();
    seed_sent(&store, "t1", "m-ours");

    // Nothing left after quote-stripping.
    let provider = StubProvider::default().with_thread(
        "t1",
        vec![message(
            "m-quoted",
            "t1",
            "Jane Doe <jane@co.com>",
            Some("\n> Hi Jane,\n> Best,"),
        )],
    );

    let new_replies = check_for_new_replies(&store, &provider).await.unwrap();
    assert!(new_replies.is_empty());
    assert!(store.get_all_replies().unwrap().is_empty());
}

#[tokio::test]
async fn provider_failure_on_one_thread_does_not_stop_the_sweep() {
    let store = store();
    seed_sent(&store, "t-broken", "m-b");
    seed_sent(&store, "t-ok", "m-ours");

    let provider = StubProvider::default()
        .with_failing_thread("t-broken")
        .with_thread(
            "t-ok",
            vec![message(
                "m-reply",
                "t-ok",
                "Jane Doe <jane@co.com>",
                Some("Yes, Thursday works."),
            )],
        );

    let new_replies = check_for_new_replies(&store, &provider).await.unwrap();
    assert_eq!(new_replies.len(), 1);
    assert_eq!(new_replies[0].message_id, "m-reply");
}

#[tokio::test]
async fn resweeps_never_duplicate_a_reply_row() {
    let store = store();
    seed_sent(&store, "t1", "m-ours");

    let provider = StubProvider::default().with_thread(
        "t1",
        vec![message(
            "m-reply",
            "t1",
            "Jane Doe <jane@co.com>",
            Some("Tell me more."),
        )],
    );

    let first = check_for_new_replies(&store, &provider).await.unwrap();
    assert_eq!(first.len(), 1);
    let reply_id = first[0].id.unwrap();

    // While unprocessed, the dedup set blocks the message entirely.
    assert!(check_for_new_replies(&store, &provider).await.unwrap().is_empty());

    // After processing, the message passes the unprocessed check but the
    // store keeps a single row for it.
    store.mark_reply_processed(reply_id).unwrap();
    check_for_new_replies(&store, &provider).await.unwrap();
    assert_eq!(store.get_all_replies().unwrap().len(), 1);
}
