//! Cold-email outreach automation over the Gmail API.

pub mod campaign;
pub mod config;
pub mod error;
pub mod gmail;
pub mod prospects;
pub mod replies;
pub mod retry;
pub mod store;
pub mod writer;
