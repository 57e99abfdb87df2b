//! Bot runner - owns the session and serialises feed events and control commands

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use signal_engine::filter::FilterStats;
use signal_engine::{
    BotSession, ClockContext, EngineError, InstrumentConfig, MarketQuote, PriceSample,
    SessionStatus, TickOutcome,
};
use tick_feed::{FeedCommand, FeedEvent, Tick};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::journal::{ActivityLevel, JournalHandle};
use crate::notify::format::{self, Priority};
use crate::notify::{ChannelStatus, DeliveryReport, NotifierHub};

/// Where wall-clock context for the filter comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockSource {
    /// Host timezone
    Local,
    Fixed(FixedOffset),
}

impl ClockSource {
    pub fn from_offset_minutes(minutes: Option<i32>) -> Self {
        match minutes {
            Some(m) => match FixedOffset::east_opt(m * 60) {
                Some(offset) => ClockSource::Fixed(offset),
                None => {
                    warn!("Ignoring out of range UTC offset of {} minutes", m);
                    ClockSource::Local
                }
            },
            None => ClockSource::Local,
        }
    }

    pub fn context(&self, now: DateTime<Utc>) -> ClockContext {
        match self {
            ClockSource::Local => ClockContext::local(now),
            ClockSource::Fixed(offset) => ClockContext::with_offset(now, *offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    GaveUp { attempts: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    #[serde(flatten)]
    pub session: SessionStatus,
    pub feed: FeedStatus,
    pub notifiers: Vec<ChannelStatus>,
    pub started_at: DateTime<Utc>,
}

/// Filter counters plus the derived rates
#[derive(Debug, Clone, Serialize)]
pub struct FilterStatsView {
    #[serde(flatten)]
    pub stats: FilterStats,
    pub approval_rate: String,
    pub adjustment_rate: String,
}

impl From<&FilterStats> for FilterStatsView {
    fn from(stats: &FilterStats) -> Self {
        Self {
            stats: stats.clone(),
            approval_rate: stats.approval_rate(),
            adjustment_rate: stats.adjustment_rate(),
        }
    }
}

pub enum ControlCommand {
    Start(oneshot::Sender<BotStatus>),
    Stop(oneshot::Sender<BotStatus>),
    Status(oneshot::Sender<BotStatus>),
    Signals {
        limit: usize,
        reply: oneshot::Sender<Vec<signal_engine::CandidateSignal>>,
    },
    SwitchInstrument {
        symbol: String,
        reply: oneshot::Sender<Result<InstrumentConfig, EngineError>>,
    },
    SetNotifier {
        channel: String,
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    TestNotifiers(oneshot::Sender<JoinHandle<Vec<DeliveryReport>>>),
    FilterStats(oneshot::Sender<FilterStatsView>),
    ResetFilterStats(oneshot::Sender<FilterStatsView>),
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("bot runner is not running")]
    Unavailable,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("notification task failed: {0}")]
    Delivery(String),
}

/// Cloneable client for the runner's command channel
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControlCommand,
    ) -> Result<T, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ControlError::Unavailable)?;
        rx.await.map_err(|_| ControlError::Unavailable)
    }

    pub async fn start(&self) -> Result<BotStatus, ControlError> {
        self.request(ControlCommand::Start).await
    }

    pub async fn stop(&self) -> Result<BotStatus, ControlError> {
        self.request(ControlCommand::Stop).await
    }

    pub async fn status(&self) -> Result<BotStatus, ControlError> {
        self.request(ControlCommand::Status).await
    }

    pub async fn signals(&self, limit: usize) -> Result<Vec<signal_engine::CandidateSignal>, ControlError> {
        self.request(|reply| ControlCommand::Signals { limit, reply }).await
    }

    pub async fn switch_instrument(&self, symbol: &str) -> Result<InstrumentConfig, ControlError> {
        let symbol = symbol.to_string();
        let result = self
            .request(|reply| ControlCommand::SwitchInstrument { symbol, reply })
            .await?;
        Ok(result?)
    }

    /// False if no channel has that name
    pub async fn set_notifier(&self, channel: &str, enabled: bool) -> Result<bool, ControlError> {
        let channel = channel.to_string();
        self.request(|reply| ControlCommand::SetNotifier {
            channel,
            enabled,
            reply,
        })
        .await
    }

    /// Send a test message and wait for every channel to answer
    pub async fn test_notifiers(&self) -> Result<Vec<DeliveryReport>, ControlError> {
        let deliveries = self.request(ControlCommand::TestNotifiers).await?;
        deliveries
            .await
            .map_err(|e| ControlError::Delivery(e.to_string()))
    }

    pub async fn filter_stats(&self) -> Result<FilterStatsView, ControlError> {
        self.request(ControlCommand::FilterStats).await
    }

    pub async fn reset_filter_stats(&self) -> Result<FilterStatsView, ControlError> {
        self.request(ControlCommand::ResetFilterStats).await
    }
}

pub struct BotRunner {
    session: BotSession,
    notifiers: NotifierHub,
    journal: JournalHandle,
    feed_commands: mpsc::Sender<FeedCommand>,
    feed_status: FeedStatus,
    announced: Option<String>,
    clock: ClockSource,
    started_at: DateTime<Utc>,
}

impl BotRunner {
    pub fn new(
        session: BotSession,
        notifiers: NotifierHub,
        journal: JournalHandle,
        feed_commands: mpsc::Sender<FeedCommand>,
        clock: ClockSource,
    ) -> Self {
        Self {
            session,
            notifiers,
            journal,
            feed_commands,
            feed_status: FeedStatus::Connecting,
            announced: None,
            clock,
            started_at: Utc::now(),
        }
    }

    /// Spawn the runner loop; it ends once every `ControlHandle` is dropped
    pub fn spawn(self, events: mpsc::Receiver<FeedEvent>) -> (ControlHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let task = tokio::spawn(self.run(events, rx));
        (ControlHandle { tx }, task)
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<FeedEvent>,
        mut commands: mpsc::Receiver<ControlCommand>,
    ) {
        info!(symbol = %self.session.instrument().symbol, "Bot runner started");
        let mut feed_open = true;

        loop {
            // feed first: a command sees every event queued before it
            tokio::select! {
                biased;

                event = events.recv(), if feed_open => match event {
                    Some(event) => self.on_feed_event(event),
                    None => {
                        debug!("Feed channel closed");
                        feed_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
            }
        }

        info!("Bot runner stopped");
    }

    fn status(&self) -> BotStatus {
        BotStatus {
            session: self.session.status(),
            feed: self.feed_status.clone(),
            notifiers: self.notifiers.statuses(),
            started_at: self.started_at,
        }
    }

    /// Tell the channels which index is streaming, once per symbol
    fn announce(&mut self, symbol: String) {
        if self.announced.as_deref() == Some(symbol.as_str()) {
            debug!(symbol = %symbol, "Feed back on an announced symbol");
            return;
        }
        let instrument = self.session.instrument();
        let text = format::alert(
            "Live feed connected",
            &format!(
                "Streaming {} ({})\nSignals: {}",
                instrument.name,
                instrument.frequency(),
                if self.session.is_running() { "running" } else { "stopped" }
            ),
            Priority::Normal,
            Utc::now(),
        );
        self.notifiers.dispatch_info(&text);
        self.announced = Some(symbol);
    }

    fn on_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Tick(tick) => self.on_tick(tick),
            FeedEvent::Connected { symbol } => {
                self.feed_status = FeedStatus::Connected;
                info!(symbol = %symbol, "Connected to Deriv WebSocket");
                self.journal.info(format!("Connected to Deriv WebSocket for {}", symbol));
                self.announce(symbol);
            }
            FeedEvent::Subscribed { symbol } => {
                self.feed_status = FeedStatus::Connected;
                self.journal.info(format!("Subscribed to {}", symbol));
                self.announce(symbol);
            }
            FeedEvent::ApiError { code, message } => {
                warn!(code = %code, "Deriv API error: {}", message);
                self.journal
                    .error("deriv api", &format!("{}: {}", code, message));
            }
            FeedEvent::Disconnected { attempt, reason } => {
                self.feed_status = FeedStatus::Reconnecting { attempt };
                self.journal.activity(
                    ActivityLevel::Warn,
                    format!("Feed disconnected ({}), reconnect attempt {}", reason, attempt),
                );
            }
            FeedEvent::GaveUp { attempts } => {
                self.feed_status = FeedStatus::GaveUp { attempts };
                error!("Tick feed gave up after {} attempts", attempts);
                self.journal.activity(
                    ActivityLevel::Error,
                    format!("Feed gave up after {} reconnect attempts", attempts),
                );
                let text = format::alert(
                    "Live feed lost",
                    &format!(
                        "Could not reconnect after {} attempts. Restart the bot to resume signals.",
                        attempts
                    ),
                    Priority::High,
                    Utc::now(),
                );
                self.notifiers.dispatch_info(&text);
            }
        }
    }

    fn on_tick(&mut self, tick: Tick) {
        if !tick.symbol.eq_ignore_ascii_case(&self.session.instrument().symbol) {
            trace!(symbol = %tick.symbol, "Dropping tick for inactive symbol");
            return;
        }

        let at = tick.timestamp();
        let sample = match PriceSample::new(tick.quote, at) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(symbol = %tick.symbol, "Dropping tick: {}", e);
                self.journal.error("tick", &e);
                return;
            }
        };
        let quote = MarketQuote {
            price: tick.quote,
            bid: tick.bid,
            ask: tick.ask,
        };
        self.journal.market_tick(&tick.symbol, &quote, at);

        let clock = self.clock.context(at);
        match self.session.on_tick(sample, quote, &clock) {
            Ok(TickOutcome::Evaluated(decision)) => {
                self.journal.record_decision(&decision.signal, &decision.verdict);
                if decision.approved() {
                    self.notifiers.dispatch_signal(&decision.signal);
                }
            }
            Ok(TickOutcome::CoolingDown { remaining }) => {
                trace!(remaining_secs = remaining.num_seconds(), "Signal gate closed");
            }
            Ok(outcome) => trace!(?outcome, "Tick processed"),
            Err(e) => {
                error!(symbol = %tick.symbol, "Tick evaluation failed: {}", e);
                self.journal.error("evaluation", &e);
            }
        }
    }

    async fn on_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Start(reply) => {
                if !self.session.is_running() {
                    self.session.start();
                    self.journal.info("Signal generation started");
                }
                let _ = reply.send(self.status());
            }
            ControlCommand::Stop(reply) => {
                if self.session.is_running() {
                    self.session.stop();
                    self.journal.info("Signal generation stopped");
                }
                let _ = reply.send(self.status());
            }
            ControlCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            ControlCommand::Signals { limit, reply } => {
                let _ = reply.send(self.session.recent_signals(limit));
            }
            ControlCommand::SwitchInstrument { symbol, reply } => {
                let result = self.session.switch_instrument(&symbol).cloned();
                if let Ok(instrument) = &result {
                    self.journal.info(format!("Switched to {}", instrument.name));
                    if self
                        .feed_commands
                        .send(FeedCommand::Subscribe(instrument.symbol.clone()))
                        .await
                        .is_err()
                    {
                        warn!("Feed task is gone, {} will not stream", instrument.symbol);
                    }
                }
                let _ = reply.send(result);
            }
            ControlCommand::SetNotifier {
                channel,
                enabled,
                reply,
            } => {
                let found = self.notifiers.set_enabled(&channel, enabled);
                if found {
                    info!(channel = %channel, enabled, "Notifier toggled");
                    self.journal.info(format!(
                        "{} notifications {}",
                        channel,
                        if enabled { "enabled" } else { "disabled" }
                    ));
                }
                let _ = reply.send(found);
            }
            ControlCommand::TestNotifiers(reply) => {
                let _ = reply.send(self.notifiers.dispatch_test());
            }
            ControlCommand::FilterStats(reply) => {
                let _ = reply.send(FilterStatsView::from(self.session.stats()));
            }
            ControlCommand::ResetFilterStats(reply) => {
                self.session.reset_stats();
                self.journal.info("Filter statistics reset");
                let _ = reply.send(FilterStatsView::from(self.session.stats()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Weekday};

    #[test]
    fn test_clock_source() {
        let now = DateTime::parse_from_rfc3339("2024-03-09T22:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = ClockSource::from_offset_minutes(Some(120)).context(now);
        assert_eq!(clock.hour, 0);
        assert_eq!(clock.weekday, Weekday::Sun);
        assert_eq!(clock.now.hour(), 22);

        assert_eq!(ClockSource::from_offset_minutes(None), ClockSource::Local);
        assert_eq!(ClockSource::from_offset_minutes(Some(100_000)), ClockSource::Local);
    }

    #[test]
    fn test_feed_status_json() {
        let json = serde_json::to_value(FeedStatus::Reconnecting { attempt: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "reconnecting", "attempt": 2}));
    }
}
