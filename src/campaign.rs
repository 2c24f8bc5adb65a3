//! Send-campaign orchestration.
//!
//! Composes the prospect list, the copy writer, the mail provider and the
//! tracking store into the one-pass send flow. All user-facing output goes
//! to stdout; diagnostics go through `tracing`.

use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Error;
use crate::gmail::MailProvider;
use crate::prospects::load_prospects;
use crate::store::{SentEmail, TrackingStore};
use crate::writer::CopyWriter;

/// Options for one campaign run, straight from the CLI.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub csv_path: PathBuf,
    /// Print each email instead of sending. No network, no store writes.
    pub dry_run: bool,
    /// Process at most this many prospects.
    pub limit: Option<usize>,
    /// Only send to this address (case-insensitive match).
    pub only_email: Option<String>,
}

/// Run the send campaign.
///
/// Gmail setup (label find-or-create, which exercises the stored
/// credentials) happens before the prospect CSV is read, so credential
/// problems surface with their remediation before any send is attempted.
/// Each successful send is persisted before the next one starts; a failed
/// send aborts the run and keeps everything already recorded.
pub async fn run_campaign(
    config: &AppConfig,
    store: &TrackingStore,
    provider: &dyn MailProvider,
    writer: &dyn CopyWriter,
    options: &SendOptions,
) -> Result<(), Error> {
    let label_id = if options.dry_run {
        None
    } else {
        Some(provider.ensure_label(&config.gmail.label).await?)
    };

    let mut prospects = load_prospects(&options.csv_path)?;
    if let Some(only) = &options.only_email {
        prospects.retain(|p| p.email.eq_ignore_ascii_case(only));
    }
    if let Some(limit) = options.limit {
        prospects.truncate(limit);
    }
    if prospects.is_empty() {
        println!("No prospects to process (check the CSV or the filters)");
        return Ok(());
    }
    info!(count = prospects.len(), dry_run = options.dry_run, "Starting campaign");

    let sender_header = config.gmail.sender_header();
    let display_name = config.gmail.display_name();

    for prospect in &prospects {
        let copy = writer.write(prospect).await;
        let body = copy.body.replace("{FROM_NAME}", display_name);

        if options.dry_run {
            println!("--- DRY RUN ---");
            println!("To: {}", prospect.email);
            println!("Subject: {}", copy.subject);
            println!("Body:\n{body}");
            println!("Label: {}", config.gmail.label);
            println!();
            continue;
        }

        let sent = provider
            .send(
                &prospect.email,
                &copy.subject,
                &body,
                &sender_header,
                label_id.as_deref(),
            )
            .await?;

        store.save_sent_email(&SentEmail {
            id: None,
            thread_id: sent.thread_id.clone(),
            message_id: sent.id.clone(),
            prospect_email: prospect.email.clone(),
            prospect_name: prospect.contact_name.clone(),
            company: prospect.company.clone(),
            subject: copy.subject.clone(),
            body,
            sent_at: Utc::now(),
            label: config.gmail.label.clone(),
        })?;

        println!(
            "Sent to {}: https://mail.google.com/mail/u/0/#sent/{}",
            prospect.email, sent.id
        );
    }

    Ok(())
}

// ── Tests ──
