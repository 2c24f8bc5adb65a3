//! Persistence layer — SQLite-backed tracking of sent emails and replies.

pub mod db;
pub mod tracking;

pub use db::Database;
pub use tracking::{CampaignStats, EmailReply, NewReply, SentEmail, TrackingStore};
