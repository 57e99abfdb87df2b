//! Service configuration
//!
//! Values are layered: built-in defaults, then the bare variable names the
//! bot has always honoured (`TELEGRAM_BOT_TOKEN`, `PORT`, ...), then
//! `SIGNAL_BOT__SECTION__KEY` environment variables.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tick_feed::ReconnectPolicy;

const ENV_PREFIX: &str = "SIGNAL_BOT";

/// Bare environment names mapped onto config keys
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
    ("TELEGRAM_CHAT_ID", "telegram.chat_id"),
    ("WHATSAPP_API_KEY", "whatsapp.api_key"),
    ("WHATSAPP_PHONE", "whatsapp.phone"),
    ("PORT", "http.port"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub log_level: String,
    pub bot: BotSettings,
    pub feed: FeedSettings,
    pub http: HttpSettings,
    pub journal: JournalSettings,
    pub notify: NotifySettings,
    pub telegram: TelegramSettings,
    pub whatsapp: WhatsAppSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotSettings {
    pub symbol: String,
    pub auto_start: bool,
    /// Fixed UTC offset for time-of-day rules; the host timezone when unset
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub endpoint: String,
    pub app_id: u32,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_attempts: u32,
}

impl FeedSettings {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_secs(self.reconnect_delay_secs),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalSettings {
    pub dir: PathBuf,
    pub retention_days: u32,
    /// Log one market snapshot per this many ticks
    pub market_sample_every: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifySettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    pub enabled: bool,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppSettings {
    pub enabled: bool,
    pub phone: Option<String>,
    pub api_key: Option<String>,
    pub api_url: String,
}

impl Settings {
    /// Load from `.env` and the process environment
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::build(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
            |name| std::env::var(name).ok(),
        )
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let legacy = vars.clone();
        Self::build(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .source(Some(vars)),
            move |name| legacy.get(name).cloned(),
        )
    }

    fn build(
        env: config::Environment,
        legacy: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("log_level", "info")?
            .set_default("bot.symbol", signal_engine::instrument::DEFAULT_SYMBOL)?
            .set_default("bot.auto_start", false)?
            .set_default("feed.endpoint", tick_feed::protocol::DEFAULT_ENDPOINT)?
            .set_default("feed.app_id", tick_feed::protocol::DEFAULT_APP_ID as i64)?
            .set_default("feed.reconnect_delay_secs", 3)?
            .set_default("feed.max_reconnect_attempts", 5)?
            .set_default("http.host", "0.0.0.0")?
            .set_default("http.port", 3000)?
            .set_default("journal.dir", "logs")?
            .set_default("journal.retention_days", 30)?
            .set_default("journal.market_sample_every", 10)?
            .set_default("notify.timeout_secs", 10)?
            .set_default("telegram.enabled", true)?
            .set_default("telegram.api_base", "https://api.telegram.org")?
            .set_default("whatsapp.enabled", true)?
            .set_default("whatsapp.api_url", "https://api.callmebot.com/whatsapp.php")?;

        for (name, key) in LEGACY_KEYS {
            if let Some(value) = legacy(name) {
                builder = builder.set_default(*key, value)?;
            }
        }

        let settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify.timeout_secs)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_vars(HashMap::new()).unwrap();
        assert_eq!(settings.bot.symbol, "1HZ75V");
        assert!(!settings.bot.auto_start);
        assert_eq!(settings.feed.app_id, 1089);
        assert_eq!(settings.feed.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(settings.http.port, 3000);
        assert_eq!(settings.journal.retention_days, 30);
        assert_eq!(settings.notify_timeout(), Duration::from_secs(10));
        assert!(settings.telegram.bot_token.is_none());
        assert_eq!(settings.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_legacy_names() {
        let settings = Settings::from_vars(vars(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "-100200"),
            ("WHATSAPP_PHONE", "+15550100"),
            ("PORT", "8088"),
        ]))
        .unwrap();

        assert_eq!(settings.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(settings.telegram.chat_id.as_deref(), Some("-100200"));
        assert_eq!(settings.whatsapp.phone.as_deref(), Some("+15550100"));
        assert_eq!(settings.http.port, 8088);
    }

    #[test]
    fn test_prefixed_overrides_legacy() {
        let settings = Settings::from_vars(vars(&[
            ("PORT", "8088"),
            ("SIGNAL_BOT__HTTP__PORT", "9000"),
            ("SIGNAL_BOT__BOT__SYMBOL", "R_50"),
            ("SIGNAL_BOT__BOT__AUTO_START", "true"),
            ("SIGNAL_BOT__FEED__MAX_RECONNECT_ATTEMPTS", "2"),
            ("SIGNAL_BOT__LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(settings.http.port, 9000);
        assert_eq!(settings.bot.symbol, "R_50");
        assert!(settings.bot.auto_start);
        assert_eq!(settings.feed.max_reconnect_attempts, 2);
        assert_eq!(settings.tracing_level(), tracing::Level::DEBUG);
    }
}
