//! Gemini-backed copy writer (generateContent REST API).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::CampaignConfig;
use crate::error::WriterError;
use crate::prospects::Prospect;

use super::{parse_email_copy, system_prompt, user_prompt, CopyWriter, EmailCopy, TemplateWriter};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Writes copy with a Gemini model, falling back to the template when the
/// request or the JSON contract fails.
#[derive(Debug)]
pub struct GeminiWriter {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    campaign: CampaignConfig,
    fallback: TemplateWriter,
}

impl GeminiWriter {
    pub fn new(
        api_key: SecretString,
        model: String,
        campaign: CampaignConfig,
        fallback: TemplateWriter,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            campaign,
            fallback,
        }
    }

    fn api_url(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }

    async fn generate(&self, prospect: &Prospect) -> Result<EmailCopy, WriterError> {
        let request = json!({
            "systemInstruction": {"parts": [{"text": system_prompt()}]},
            "contents": [
                {"role": "user", "parts": [{"text": user_prompt(&self.campaign, prospect)}]}
            ],
            "generationConfig": {"temperature": 0.7},
        });

        let response = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| WriterError::RequestFailed {
                provider: "gemini".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriterError::RequestFailed {
                provider: "gemini".to_string(),
                reason: format!("HTTP {}: {}", status.as_u16(), body),
            });
        }

        let reply: GenerateResponse =
            response.json().await.map_err(|e| WriterError::RequestFailed {
                provider: "gemini".to_string(),
                reason: e.to_string(),
            })?;
        let content = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let mut copy = parse_email_copy("gemini", &content)?;
        if copy.subject.trim().is_empty() {
            copy.subject = self.fallback.render(prospect).subject;
        }
        Ok(copy)
    }
}

#[async_trait]
impl CopyWriter for GeminiWriter {
    async fn write(&self, prospect: &Prospect) -> EmailCopy {
        match self.generate(prospect).await {
            Ok(copy) => copy,
            Err(e) => {
                warn!(error = %e, to = %prospect.email, "Gemini copy failed, using template");
                self.fallback.render(prospect)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ── Tests ──
