//! Notification channels
//!
//! Every send is best effort: the hub spawns one task per dispatch, sends to
//! all enabled channels concurrently and logs failures. Nothing in the signal
//! pipeline waits on delivery.

pub mod format;
pub mod telegram;
pub mod whatsapp;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use signal_engine::CandidateSignal;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::Settings;
pub use telegram::TelegramNotifier;
pub use whatsapp::WhatsAppNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{channel} rejected message: {status} - {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    fn format_signal(&self, signal: &CandidateSignal) -> String;

    async fn send_text(&self, text: &str) -> Result<(), NotifyError>;
}

/// Outcome of one send on one channel
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub channel: &'static str,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub channel: &'static str,
    pub enabled: bool,
    pub configured: bool,
}

struct Channel {
    notifier: Arc<dyn Notifier>,
    enabled: bool,
}

/// Set of notification channels with per-channel toggles
pub struct NotifierHub {
    channels: Vec<Channel>,
}

impl NotifierHub {
    pub fn new() -> Self {
        Self { channels: Vec::new() }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, NotifyError> {
        let timeout = settings.notify_timeout();
        let mut hub = Self::new();
        hub.register(
            Arc::new(TelegramNotifier::new(&settings.telegram, timeout)?),
            settings.telegram.enabled,
        );
        hub.register(
            Arc::new(WhatsAppNotifier::new(&settings.whatsapp, timeout)?),
            settings.whatsapp.enabled,
        );
        Ok(hub)
    }

    pub fn register(&mut self, notifier: Arc<dyn Notifier>, enabled: bool) {
        self.channels.push(Channel { notifier, enabled });
    }

    /// Toggle a channel by name; false if no such channel exists
    pub fn set_enabled(&mut self, channel: &str, enabled: bool) -> bool {
        match self
            .channels
            .iter_mut()
            .find(|c| c.notifier.name().eq_ignore_ascii_case(channel))
        {
            Some(c) => {
                c.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn statuses(&self) -> Vec<ChannelStatus> {
        self.channels
            .iter()
            .map(|c| ChannelStatus {
                channel: c.notifier.name(),
                enabled: c.enabled,
                configured: c.notifier.is_configured(),
            })
            .collect()
    }

    fn active(&self) -> impl Iterator<Item = &Arc<dyn Notifier>> {
        self.channels
            .iter()
            .filter(|c| c.enabled && c.notifier.is_configured())
            .map(|c| &c.notifier)
    }

    pub fn dispatch_signal(&self, signal: &CandidateSignal) -> JoinHandle<Vec<DeliveryReport>> {
        let jobs = self
            .active()
            .map(|n| (Arc::clone(n), n.format_signal(signal)))
            .collect();
        spawn_deliveries(jobs)
    }

    pub fn dispatch_info(&self, text: &str) -> JoinHandle<Vec<DeliveryReport>> {
        let jobs = self.active().map(|n| (Arc::clone(n), text.to_string())).collect();
        spawn_deliveries(jobs)
    }

    /// Send a test message to every enabled channel, configured or not
    pub fn dispatch_test(&self) -> JoinHandle<Vec<DeliveryReport>> {
        let text = format::test_message(Utc::now());
        let jobs = self
            .channels
            .iter()
            .filter(|c| c.enabled)
            .map(|c| (Arc::clone(&c.notifier), text.clone()))
            .collect();
        spawn_deliveries(jobs)
    }
}

impl Default for NotifierHub {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_deliveries(jobs: Vec<(Arc<dyn Notifier>, String)>) -> JoinHandle<Vec<DeliveryReport>> {
    tokio::spawn(async move {
        let sends = jobs.into_iter().map(|(notifier, text)| async move {
            let channel = notifier.name();
            match notifier.send_text(&text).await {
                Ok(()) => {
                    debug!(channel, "Notification delivered");
                    DeliveryReport {
                        channel,
                        success: true,
                        message: "sent".to_string(),
                    }
                }
                Err(e) => {
                    error!(channel, "Failed to send notification: {}", e);
                    DeliveryReport {
                        channel,
                        success: false,
                        message: e.to_string(),
                    }
                }
            }
        });
        futures::future::join_all(sends).await
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory channel that records what it was asked to send
    pub struct RecordingNotifier {
        pub name: &'static str,
        pub fail: bool,
        pub sent: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        pub fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                sent: Mutex::new(Vec::new()),
            })
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn format_signal(&self, signal: &CandidateSignal) -> String {
            format!("{} {}", signal.direction, signal.symbol)
        }

        async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(NotifyError::NotConfigured("recording"))
            } else {
                Ok(())
            }
        }
    }
}
