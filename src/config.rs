//! Configuration types, loaded from a TOML file.
//!
//! Every path and name that used to be a hard-coded default lives here so
//! the store and the Gmail client receive them at construction time.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub gmail: GmailConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    pub campaign: CampaignConfig,
}

/// Gmail account and credential-file settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GmailConfig {
    /// Display name for the From header. Empty means "send bare address".
    #[serde(default)]
    pub from_name: String,
    /// Address the campaign sends from.
    pub from_email: String,
    /// Label applied to every sent campaign message.
    #[serde(default = "default_label")]
    pub label: String,
    /// OAuth client file (Desktop app credentials).
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Stored authorized-user token, refreshed in place when expired.
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
}

impl GmailConfig {
    /// From header value: `"Name <addr>"`, or the bare address when no
    /// display name is configured.
    pub fn sender_header(&self) -> String {
        if self.from_name.is_empty() {
            self.from_email.clone()
        } else {
            format!("{} <{}>", self.from_name, self.from_email)
        }
    }

    /// Name substituted for the `{FROM_NAME}` placeholder in email bodies.
    pub fn display_name(&self) -> &str {
        if self.from_name.is_empty() {
            &self.from_email
        } else {
            &self.from_name
        }
    }
}

/// Tracking-store settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database file. Parent directories are created on open.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Which copy generator writes the emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterBackend {
    /// Static template, no network.
    #[default]
    Template,
    /// OpenAI chat completions.
    OpenAi,
    /// Google Gemini.
    Gemini,
}

/// Copy-generator settings.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriterConfig {
    #[serde(default)]
    pub provider: WriterBackend,
    /// Model name; falls back to a per-provider default when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// API key for the LLM providers. Ignored by the template writer.
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

impl WriterConfig {
    /// Effective model name for the configured provider.
    pub fn model(&self) -> &str {
        match self.model.as_deref() {
            Some(m) => m,
            None => match self.provider {
                WriterBackend::Template => "",
                WriterBackend::OpenAi => "gpt-4o-mini",
                WriterBackend::Gemini => "gemini-1.5-flash-8b",
            },
        }
    }
}

/// What the campaign is pitching.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    /// Short name of the offered service.
    pub service_name: String,
    /// One-sentence value proposition woven into the copy.
    pub value_prop: String,
    /// Call to action closing the email.
    pub cta: String,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gmail.from_email.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "gmail.from_email".into(),
                message: "must not be empty".into(),
            });
        }
        if self.writer.provider != WriterBackend::Template && self.writer.api_key.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "writer.api_key".into(),
                hint: "The configured writer provider needs an API key; set one or switch \
                       writer.provider to \"template\""
                    .into(),
            });
        }
        Ok(())
    }
}

fn default_label() -> String {
    "cold-outreach".to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/outreach.db")
}
