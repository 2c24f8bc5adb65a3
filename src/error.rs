//! Error types for the outreach tool.

use std::path::PathBuf;

/// Top-level error type for the tool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracking store error: {0}")]
    Store(#[from] StoreError),

    #[error("Gmail error: {0}")]
    Gmail(#[from] GmailError),

    #[error("Prospect list error: {0}")]
    Prospect(#[from] ProspectError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },
}

/// Tracking-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A sent email with this provider message id already exists. The
    /// provider assigns globally unique ids, so a collision means the same
    /// message was recorded twice — a genuine anomaly that must surface.
    #[error("A sent email with provider message id {message_id} is already tracked")]
    DuplicateSentMessage { message_id: String },

    #[error("Query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Gmail API and credential errors.
///
/// The credential variants carry their remediation step in the message:
/// these are fatal to the current operation and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum GmailError {
    #[error(
        "OAuth client file not found at {path}. Download the OAuth client \
         credentials (Desktop app) from the Google Cloud Console and save \
         them there"
    )]
    MissingCredentials { path: PathBuf },

    #[error(
        "Stored token not found at {path}. Authorize the account for the \
         gmail.send, gmail.labels, gmail.modify and gmail.readonly scopes \
         and save the authorized-user file there"
    )]
    MissingToken { path: PathBuf },

    #[error("Malformed credential file {path}: {reason}")]
    InvalidCredentials { path: PathBuf, reason: String },

    #[error(
        "Token refresh was rejected: {reason}. Delete the stored token file \
         and re-authorize"
    )]
    TokenRefresh { reason: String },

    #[error(
        "The Gmail API is disabled for this project. Enable it at \
         https://console.developers.google.com/apis/api/gmail.googleapis.com/overview \
         and retry"
    )]
    ApiDisabled,

    #[error(
        "The stored token is missing required scopes. Delete the stored \
         token file and re-authorize granting gmail.send, gmail.labels, \
         gmail.modify and gmail.readonly"
    )]
    InsufficientScopes,

    #[error(
        "The message was sent but the label could not be applied: \
         insufficient OAuth scopes. Delete the stored token file and \
         re-authorize granting gmail.labels"
    )]
    LabelNotApplied,

    #[error("Gmail API request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not build outbound message: {reason}")]
    InvalidMessage { reason: String },
}

impl GmailError {
    /// Whether a send attempt that failed with this error may be retried.
    ///
    /// Credential and scope problems are fatal until the user intervenes;
    /// transport errors and server-side failures are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            GmailError::Http(_) => true,
            GmailError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Copy-generation errors. These never escape the writer: every failure
/// falls back to the static template.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Prospect CSV errors.
#[derive(Debug, thiserror::Error)]
pub enum ProspectError {
    #[error("Prospect CSV is missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("Failed to read prospect CSV {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed prospect CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for the tool.
pub type Result<T> = std::result::Result<T, Error>;
