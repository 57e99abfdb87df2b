//! WhatsApp sink via the CallMeBot gateway

use async_trait::async_trait;
use reqwest::Client;
use signal_engine::CandidateSignal;
use std::time::Duration;
use tracing::debug;

use super::{format, Notifier, NotifyError};
use crate::config::WhatsAppSettings;

pub struct WhatsAppNotifier {
    client: Client,
    api_url: String,
    phone: Option<String>,
    api_key: Option<String>,
}

impl WhatsAppNotifier {
    pub fn new(settings: &WhatsAppSettings, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            phone: settings.phone.clone().filter(|p| !p.is_empty()),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    fn is_configured(&self) -> bool {
        self.phone.is_some() && self.api_key.is_some()
    }

    fn format_signal(&self, signal: &CandidateSignal) -> String {
        format::concise_signal(signal)
    }

    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let (Some(phone), Some(api_key)) = (&self.phone, &self.api_key) else {
            return Err(NotifyError::NotConfigured(
                "whatsapp (set WHATSAPP_PHONE and WHATSAPP_API_KEY)",
            ));
        };

        let response = self
            .client
            .get(&self.api_url)
            .query(&[("phone", phone.as_str()), ("text", text), ("apikey", api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: "whatsapp",
                status,
                body,
            });
        }

        debug!("WhatsApp message sent");
        Ok(())
    }
}
