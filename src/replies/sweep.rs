//! Reply polling sweep over monitored threads.

use tracing::{info, warn};

use crate::error::{GmailError, StoreError};
use crate::gmail::MailProvider;
use crate::store::{EmailReply, TrackingStore};

use super::extract::{is_reply_from_prospect, parse_reply_content};

/// Poll every monitored thread for prospect replies, persisting and
/// returning the newly recorded ones.
///
/// Best-effort per thread: a provider failure on one thread is logged and
/// the sweep moves on, so a single bad thread cannot starve the rest.
/// Store failures abort the sweep; if the database is broken, so is the
/// whole run.
pub async fn check_for_new_replies(
    store: &TrackingStore,
    provider: &dyn MailProvider,
) -> Result<Vec<EmailReply>, StoreError> {
    let thread_ids = store.thread_ids_for_monitoring()?;
    info!(threads = thread_ids.len(), "Checking threads for replies");

    let mut new_replies = Vec::new();
    for thread_id in &thread_ids {
        match sweep_thread(store, provider, thread_id, &mut new_replies).await {
            Ok(()) => {}
            Err(SweepError::Store(e)) => return Err(e),
            Err(SweepError::Provider(e)) => {
                warn!(thread_id = %thread_id, error = %e, "Skipping thread after provider error");
            }
        }
    }
    Ok(new_replies)
}

async fn sweep_thread(
    store: &TrackingStore,
    provider: &dyn MailProvider,
    thread_id: &str,
    new_replies: &mut Vec<EmailReply>,
) -> Result<(), SweepError> {
    let Some(sent_email) = store.get_sent_email_by_thread_id(thread_id)? else {
        return Ok(());
    };
    let Some(sent_email_id) = sent_email.id else {
        return Ok(());
    };

    let messages = provider.list_thread_messages(thread_id).await?;
    for message in messages {
        // Known unprocessed replies, re-read per message. save_reply is
        // idempotent so a stale set here is harmless.
        let known = store.get_new_replies()?;
        if known.iter().any(|r| r.message_id == message.id) {
            continue;
        }

        if !is_reply_from_prospect(&message, &sent_email.prospect_email) {
            continue;
        }

        let full = provider.get_message(&message.id).await?;
        let reply_content = parse_reply_content(&full);
        if reply_content.is_empty() {
            continue;
        }

        let mut reply = EmailReply {
            id: None,
            sent_email_id,
            message_id: message.id.clone(),
            from_email: sent_email.prospect_email.clone(),
            reply_content,
            received_at: full.received_at(),
            processed: false,
        };
        let id = store.save_reply(&reply)?;
        reply.id = Some(id);
        info!(
            company = %sent_email.company,
            from = %sent_email.prospect_email,
            "New reply recorded"
        );
        new_replies.push(reply);
    }
    Ok(())
}

/// Internal split so per-thread handling can tell "skip this thread" from
/// "stop the sweep".
#[derive(Debug, thiserror::Error)]
enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Provider(#[from] GmailError),
}
