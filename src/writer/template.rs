//! Static template copy, also the fallback for the LLM writers.

use async_trait::async_trait;

use crate::config::CampaignConfig;
use crate::prospects::Prospect;

use super::{CopyWriter, EmailCopy};

/// Fills a fixed outreach template from campaign settings and prospect data.
#[derive(Debug, Clone)]
pub struct TemplateWriter {
    campaign: CampaignConfig,
}

impl TemplateWriter {
    pub fn new(campaign: CampaignConfig) -> Self {
        Self { campaign }
    }

    /// Render copy for a prospect. Synchronous so the LLM writers can call
    /// it from their failure paths.
    pub fn render(&self, prospect: &Prospect) -> EmailCopy {
        let subject = format!("{} x {}?", prospect.company, self.campaign.service_name);

        let greeting = if is_blank(&prospect.contact_name) {
            "Hi,".to_string()
        } else {
            format!("Hi {},", prospect.contact_name)
        };
        let notes = if is_blank(&prospect.notes) {
            "a few opportunities to streamline the day-to-day"
        } else {
            prospect.notes.as_str()
        };

        let body = format!(
            "{greeting}\n\n\
             I work on {service} for small businesses. {value_prop}\n\n\
             For {company} I noticed: {notes}. Would you be open to a short \
             call about it? {cta}\n\n\
             Best,\n\
             {{FROM_NAME}}",
            service = self.campaign.service_name.to_lowercase(),
            value_prop = self.campaign.value_prop,
            company = prospect.company,
            cta = self.campaign.cta,
        );

        EmailCopy { subject, body }
    }
}

#[async_trait]
impl CopyWriter for TemplateWriter {
    async fn write(&self, prospect: &Prospect) -> EmailCopy {
        self.render(prospect)
    }
}

/// Empty or a `"nan"` artifact from a spreadsheet export.
fn is_blank(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("nan")
}

// ── Tests ──
