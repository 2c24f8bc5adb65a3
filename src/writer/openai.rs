//! OpenAI-backed copy writer (chat completions REST API).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::CampaignConfig;
use crate::error::WriterError;
use crate::prospects::Prospect;

use super::{parse_email_copy, system_prompt, user_prompt, CopyWriter, EmailCopy, TemplateWriter};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Writes copy with an OpenAI chat model, falling back to the template when
/// the request or the JSON contract fails.
#[derive(Debug)]
pub struct OpenAiWriter {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    campaign: CampaignConfig,
    fallback: TemplateWriter,
}

impl OpenAiWriter {
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

    async fn generate(&self, prospect: &Prospect) -> Result<EmailCopy, WriterError> {
        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt()},
                {"role": "user", "content": user_prompt(&self.campaign, prospect)},
            ],
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| WriterError::RequestFailed {
                provider: "openai".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriterError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("HTTP {}: {}", status.as_u16(), body),
            });
        }

        let completion: ChatCompletion =
            response.json().await.map_err(|e| WriterError::RequestFailed {
                provider: "openai".to_string(),
                reason: e.to_string(),
            })?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let mut copy = parse_email_copy("openai", &content)?;
        if copy.subject.trim().is_empty() {
            copy.subject = self.fallback.render(prospect).subject;
        }
        Ok(copy)
    }
}

#[async_trait]
impl CopyWriter for OpenAiWriter {
    async fn write(&self, prospect: &Prospect) -> EmailCopy {
        match self.generate(prospect).await {
            Ok(copy) => copy,
            Err(e) => {
                warn!(error = %e, to = %prospect.email, "OpenAI copy failed, using template");
                self.fallback.render(prospect)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ── Tests ──
