//! Telegram Bot API sink

use async_trait::async_trait;
use reqwest::Client;
use signal_engine::CandidateSignal;
use std::time::Duration;
use tracing::debug;

use super::{format, Notifier, NotifyError};
use crate::config::TelegramSettings;

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(settings: &TelegramSettings, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            bot_token: settings.bot_token.clone().filter(|t| !t.is_empty()),
            chat_id: settings.chat_id.clone().filter(|c| !c.is_empty()),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    fn format_signal(&self, signal: &CandidateSignal) -> String {
        format::detailed_signal(signal)
    }

    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let (Some(token), Some(chat_id)) = (&self.bot_token, &self.chat_id) else {
            return Err(NotifyError::NotConfigured(
                "telegram (set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID)",
            ));
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: "telegram",
                status,
                body,
            });
        }

        debug!("Telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(api_base: &str, token: Option<&str>) -> TelegramSettings {
        TelegramSettings {
            enabled: true,
            bot_token: token.map(str::to_string),
            chat_id: Some("-1001".to_string()),
            api_base: api_base.to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({"chat_id": "-1001", "text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&settings(&server.uri(), Some("TOKEN")), Duration::from_secs(5)).unwrap();
        assert!(notifier.is_configured());
        notifier.send_text("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&settings(&server.uri(), Some("BAD")), Duration::from_secs(5)).unwrap();
        match notifier.send_text("hello").await {
            Err(NotifyError::Rejected { status, body, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_not_configured() {
        let notifier = TelegramNotifier::new(&settings("http://127.0.0.1:9", None), Duration::from_secs(1)).unwrap();
        assert!(!notifier.is_configured());
        assert!(matches!(notifier.send_text("x").await, Err(NotifyError::NotConfigured(_))));
    }
}
