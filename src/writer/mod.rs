//! Email copy generation.
//!
//! Three interchangeable writers selected by `[writer] provider`:
//! - **Template**: static fill-in copy, no network.
//! - **OpenAI**: chat completions REST API.
//! - **Gemini**: generateContent REST API.
//!
//! The LLM writers hold the model to a JSON `{"subject", "body"}` output
//! contract and recover from any request or parse failure by rendering the
//! template instead, so `CopyWriter::write` never errors.

pub mod gemini;
pub mod openai;
pub mod template;

pub use gemini::GeminiWriter;
pub use openai::OpenAiWriter;
pub use template::TemplateWriter;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::error;

use crate::config::{CampaignConfig, WriterBackend, WriterConfig};
use crate::error::{ConfigError, WriterError};
use crate::prospects::Prospect;

/// Generated copy for one prospect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailCopy {
    pub subject: String,
    /// May carry a literal `{FROM_NAME}` placeholder; the campaign
    /// substitutes the sender name at send time.
    pub body: String,
}

/// Writes outreach copy for a prospect.
#[async_trait]
pub trait CopyWriter: Send + Sync + std::fmt::Debug {
    async fn write(&self, prospect: &Prospect) -> EmailCopy;
}

/// Create a copy writer from configuration.
pub fn create_writer(
    writer: &WriterConfig,
    campaign: &CampaignConfig,
) -> Result<Arc<dyn CopyWriter>, ConfigError> {
    let template = TemplateWriter::new(campaign.clone());
    match writer.provider {
        WriterBackend::Template => {
            tracing::info!("Using template writer");
            Ok(Arc::new(template))
        }
        WriterBackend::OpenAi => {
            let api_key = require_api_key(writer)?;
            tracing::info!("Using OpenAI writer (model: {})", writer.model());
            Ok(Arc::new(OpenAiWriter::new(
                api_key,
                writer.model().to_string(),
                campaign.clone(),
                template,
            )))
        }
        WriterBackend::Gemini => {
            let api_key = require_api_key(writer)?;
            tracing::info!("Using Gemini writer (model: {})", writer.model());
            Ok(Arc::new(GeminiWriter::new(
                api_key,
                writer.model().to_string(),
                campaign.clone(),
                template,
            )))
        }
    }
}

fn require_api_key(writer: &WriterConfig) -> Result<SecretString, ConfigError> {
    writer
        .api_key
        .clone()
        .ok_or_else(|| ConfigError::MissingRequired {
            key: "writer.api_key".into(),
            hint: "The configured writer provider needs an API key; set one or \
                   switch writer.provider to \"template\""
                .into(),
        })
}

// ── Shared LLM plumbing ──

/// System prompt shared by the LLM writers.
pub(crate) fn system_prompt() -> &'static str {
    "You are a sales copywriter. Write short, polite cold emails (at most 120 \
     words) with a clear value proposition and one concrete question. Use \
     plain language and no buzzwords."
}

/// Per-prospect user prompt shared by the LLM writers.
pub(crate) fn user_prompt(campaign: &CampaignConfig, prospect: &Prospect) -> String {
    format!(
        "Goal: cold email for the service '{service}'.\n\
         Value proposition: {value_prop}.\n\
         Call to action: {cta}.\n\
         Prospect: company='{company}', contact='{contact}', notes='{notes}'.\n\
         Respond with JSON carrying the fields subject and body. Use \
         {{FROM_NAME}} as a placeholder for the sender name.",
        service = campaign.service_name,
        value_prop = campaign.value_prop,
        cta = campaign.cta,
        company = prospect.company,
        contact = prospect.contact_name,
        notes = prospect.notes,
    )
}

/// Model output parsed against the JSON contract.
#[derive(Debug, Deserialize)]
struct CopyPayload {
    subject: Option<String>,
    body: Option<String>,
}

/// Parse `{"subject", "body"}` from model output.
///
/// The subject may come back empty; callers substitute their own. An empty
/// body is an error so the caller falls back to the template instead of
/// sending a blank email.
pub(crate) fn parse_email_copy(provider: &str, raw: &str) -> Result<EmailCopy, WriterError> {
    let payload: CopyPayload = serde_json::from_str(&extract_json_object(raw))?;
    let body = payload.body.unwrap_or_default();
    if body.trim().is_empty() {
        return Err(WriterError::InvalidResponse {
            provider: provider.to_string(),
            reason: "no body in model output".to_string(),
        });
    }
    Ok(EmailCopy {
        subject: payload.subject.unwrap_or_default(),
        body,
    })
}

/// Extract a JSON object from model output that might contain markdown or
/// extra text.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return trimmed[start..=end].to_string();
            }
        }
    }

    // Give up, return as-is
    error!(text = trimmed, "Could not extract a JSON object from model output");
    trimmed.to_string()
}

// ── Tests ──
