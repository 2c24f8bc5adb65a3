//! Reply handling — classification, text extraction, and the polling sweep.

pub mod extract;
pub mod sweep;

pub use extract::{extract_text_from_payload, is_reply_from_prospect, parse_reply_content};
pub use sweep::check_for_new_replies;
