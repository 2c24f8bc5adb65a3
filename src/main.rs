use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use outreach::campaign::{run_campaign, SendOptions};
use outreach::config::AppConfig;
use outreach::error::Error;
use outreach::gmail::{GmailClient, MailProvider};
use outreach::replies::check_for_new_replies;
use outreach::retry::RetryPolicy;
use outreach::store::{Database, NewReply, TrackingStore};
use outreach::writer::create_writer;

#[derive(Parser)]
#[command(name = "outreach", version, about = "Cold-email outreach over the Gmail API")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send the campaign to the prospect list.
    Send {
        /// Prospect CSV with a company,contact_name,email[,notes] header.
        #[arg(long, default_value = "data/prospects.csv")]
        csv: PathBuf,
        /// Generate and print the emails without sending anything.
        #[arg(long)]
        dry_run: bool,
        /// Process at most this many prospects.
        #[arg(long)]
        limit: Option<usize>,
        /// Only send to this address.
        #[arg(long)]
        only_email: Option<String>,
    },
    /// Poll tracked threads for new replies.
    Replies {
        /// Print campaign statistics and exit.
        #[arg(long)]
        stats: bool,
        /// Mark one reply as processed and exit.
        #[arg(long, value_name = "ID")]
        mark_processed: Option<i64>,
        /// List every tracked reply, processed ones included, and exit.
        #[arg(long)]
        show_all: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = AppConfig::load(&cli.config)?;
    let store = TrackingStore::new(Arc::new(Database::open(&config.store.path)?));

    match cli.command {
        Command::Send {
            csv,
            dry_run,
            limit,
            only_email,
        } => {
            let writer = create_writer(&config.writer, &config.campaign)?;
            let client = gmail_client(&config);
            let options = SendOptions {
                csv_path: csv,
                dry_run,
                limit,
                only_email,
            };
            run_campaign(&config, &store, &client, writer.as_ref(), &options).await
        }
        Command::Replies {
            stats,
            mark_processed,
            show_all,
        } => {
            if stats {
                print_stats(&store)?;
                return Ok(());
            }
            if let Some(id) = mark_processed {
                store.mark_reply_processed(id)?;
                println!("✅ Marked reply {id} as processed");
                return Ok(());
            }
            if show_all {
                print_all_replies(&store)?;
                return Ok(());
            }

            let client = gmail_client(&config);
            run_sweep(&store, &client).await;
            Ok(())
        }
    }
}

fn gmail_client(config: &AppConfig) -> GmailClient {
    GmailClient::new(
        config.gmail.credentials_path.clone(),
        config.gmail.token_path.clone(),
        RetryPolicy::default(),
    )
}

/// Run the poll sweep and print the digest of new replies.
async fn run_sweep(store: &TrackingStore, provider: &dyn MailProvider) {
    println!("🔍 Checking for new replies to your cold emails...");

    let new_replies = match check_for_new_replies(store, provider).await {
        Ok(replies) => replies,
        Err(e) => {
            println!("❌ Error checking for replies: {e}");
            std::process::exit(1);
        }
    };

    if new_replies.is_empty() {
        println!("✅ No new replies found");
        return;
    }

    println!("\n🎉 Found {} new reply(s)!\n", new_replies.len());

    // Join each reply with its owning sent email for display.
    let sent = store.get_sent_emails(None).unwrap_or_default();
    let mut index = 0;
    for reply in &new_replies {
        let Some(owner) = sent.iter().find(|s| s.id == Some(reply.sent_email_id)) else {
            continue;
        };
        index += 1;
        print_reply_entry(
            index,
            &NewReply {
                id: reply.id.unwrap_or_default(),
                message_id: reply.message_id.clone(),
                from_email: reply.from_email.clone(),
                reply_content: reply.reply_content.clone(),
                received_at: reply.received_at,
                processed: reply.processed,
                company: owner.company.clone(),
                prospect_name: owner.prospect_name.clone(),
                subject: owner.subject.clone(),
            },
        );
    }

    println!("💡 Tip: Use --mark-processed <reply_id> to mark replies as handled");
    println!("💡 Tip: Use --stats to see campaign statistics");
}

fn print_stats(store: &TrackingStore) -> Result<(), Error> {
    let stats = store.get_stats()?;
    println!("\n📊 Email Campaign Statistics:");
    println!("   Total sent emails: {}", stats.total_sent);
    println!("   Total replies: {}", stats.total_replies);
    println!("   New (unprocessed) replies: {}", stats.new_replies);
    println!("   Response rate: {}%", stats.response_rate);
    Ok(())
}

fn print_all_replies(store: &TrackingStore) -> Result<(), Error> {
    let replies = store.get_all_replies()?;
    if replies.is_empty() {
        println!("No replies tracked yet");
        return Ok(());
    }

    println!("\n📬 All tracked replies ({}):\n", replies.len());
    for (i, reply) in replies.iter().enumerate() {
        print_reply_entry(i + 1, reply);
    }
    Ok(())
}

fn print_reply_entry(index: usize, reply: &NewReply) {
    let marker = if reply.processed { " (processed)" } else { "" };
    println!("{index}. 📧 {}{marker}", reply.company);
    println!("   From: {} ({})", reply.prospect_name, reply.from_email);
    println!("   Subject: {}", reply.subject);
    println!("   Received: {}", reply.received_at.format("%Y-%m-%d %H:%M"));
    println!("   Reply: {}", truncate_reply(&reply.reply_content));
    println!("   Reply ID: {}", reply.id);
    println!();
}

/// First 200 characters, with an ellipsis when the content is longer.
fn truncate_reply(content: &str) -> String {
    if content.chars().count() > 200 {
        let head: String = content.chars().take(200).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}
