//! Bot session - the single owner of per-instrument pipeline state

use chrono::Duration;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::assembler::assemble;
use crate::classifier::{classify, ClassificationLabels};
use crate::context::{ClockContext, MarketQuote};
use crate::error::{EngineError, Result};
use crate::filter::{FilterStats, FilterVerdict, RuleFilter};
use crate::gate::SignalGate;
use crate::indicators::IndicatorSnapshot;
use crate::instrument::{self, InstrumentConfig};
use crate::signal::CandidateSignal;
use crate::window::{PriceSample, PriceWindow};

/// Approved signals kept for status queries
pub const RECENT_SIGNALS_LIMIT: usize = 50;

/// An evaluated signal and the verdict that decided it
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub signal: CandidateSignal,
    pub verdict: FilterVerdict,
}

impl Decision {
    pub fn approved(&self) -> bool {
        self.verdict.approve
    }
}

/// What happened to one tick
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Bot is stopped; the window was still updated
    Idle,
    Warmup { available: usize, needed: usize },
    Neutral(ClassificationLabels),
    BelowThreshold(ClassificationLabels),
    CoolingDown { remaining: Duration },
    Evaluated(Box<Decision>),
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub running: bool,
    pub symbol: String,
    pub instrument_name: String,
    pub frequency: String,
    pub current_price: Option<f64>,
    pub window_len: usize,
    pub window_capacity: usize,
    pub ticks_seen: u64,
    pub last_signal_at: Option<chrono::DateTime<chrono::Utc>>,
    pub recent_signals: usize,
}

pub struct BotSession {
    running: bool,
    instrument: InstrumentConfig,
    window: PriceWindow,
    gate: SignalGate,
    filter: RuleFilter,
    recent: VecDeque<CandidateSignal>,
    stats: FilterStats,
    last_quote: Option<MarketQuote>,
    ticks_seen: u64,
}

impl BotSession {
    pub fn new(instrument: InstrumentConfig) -> Self {
        Self::with_filter(instrument, RuleFilter::default())
    }

    pub fn with_filter(instrument: InstrumentConfig, filter: RuleFilter) -> Self {
        Self {
            running: false,
            window: PriceWindow::for_cadence(instrument.cadence),
            instrument,
            gate: SignalGate::new(),
            filter,
            recent: VecDeque::with_capacity(RECENT_SIGNALS_LIMIT),
            stats: FilterStats::default(),
            last_quote: None,
            ticks_seen: 0,
        }
    }

    pub fn for_symbol(symbol: &str) -> Result<Self> {
        Ok(Self::new(instrument::find(symbol)?))
    }

    pub fn start(&mut self) {
        if !self.running {
            info!(symbol = %self.instrument.symbol, "Signal generation started");
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            info!(symbol = %self.instrument.symbol, "Signal generation stopped");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn instrument(&self) -> &InstrumentConfig {
        &self.instrument
    }

    /// Switch the active instrument
    ///
    /// The window is rebuilt for the new cadence since prices of different
    /// indices are not comparable. The emission gate is left untouched.
    pub fn switch_instrument(&mut self, symbol: &str) -> Result<&InstrumentConfig> {
        let next = instrument::find(symbol)?;
        info!(from = %self.instrument.symbol, to = %next.symbol, "Switching instrument");
        self.window = PriceWindow::for_cadence(next.cadence);
        self.last_quote = None;
        self.instrument = next;
        Ok(&self.instrument)
    }

    /// Feed one tick through the pipeline
    pub fn on_tick(
        &mut self,
        sample: PriceSample,
        quote: MarketQuote,
        clock: &ClockContext,
    ) -> Result<TickOutcome> {
        self.window.push(sample);
        self.last_quote = Some(quote);
        self.ticks_seen += 1;

        if !self.running {
            return Ok(TickOutcome::Idle);
        }
        self.evaluate(&quote, clock)
    }

    fn evaluate(&mut self, quote: &MarketQuote, clock: &ClockContext) -> Result<TickOutcome> {
        let cadence = self.instrument.cadence;
        let profile = cadence.profile();

        let prices = self.window.last_n(self.window.len());
        let indicators = match IndicatorSnapshot::compute(&prices, profile) {
            Ok(snapshot) => snapshot,
            Err(EngineError::InsufficientData { needed, available }) => {
                return Ok(TickOutcome::Warmup { available, needed });
            }
            Err(e) => return Err(e),
        };

        let labels = classify(&indicators, cadence);
        let direction = match labels.direction() {
            Some(direction) => direction,
            None => return Ok(TickOutcome::Neutral(labels)),
        };
        if !labels.is_actionable(cadence) {
            return Ok(TickOutcome::BelowThreshold(labels));
        }

        if !self.gate.allow(clock.now, cadence) {
            return Ok(TickOutcome::CoolingDown {
                remaining: self.gate.remaining(clock.now, cadence),
            });
        }

        let mut signal = assemble(&self.instrument, quote, indicators, labels, direction, clock.now)?;
        let verdict = self.filter.evaluate(&signal, quote, clock);
        signal.apply_verdict(&verdict, clock.now);
        self.stats.record(&verdict);

        if verdict.approve {
            self.gate.record(clock.now);
            self.recent.push_front(signal.clone());
            self.recent.truncate(RECENT_SIGNALS_LIMIT);
            info!(
                signal_id = %signal.id,
                symbol = %signal.symbol,
                direction = %signal.direction,
                confidence = signal.confidence,
                "Signal approved"
            );
        } else {
            debug!(symbol = %signal.symbol, reason = %verdict.reason, "Signal rejected");
        }

        Ok(TickOutcome::Evaluated(Box::new(Decision { signal, verdict })))
    }

    /// Approved signals, newest first
    pub fn recent_signals(&self, limit: usize) -> Vec<CandidateSignal> {
        self.recent.iter().take(limit).cloned().collect()
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn gate(&self) -> &SignalGate {
        &self.gate
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn last_quote(&self) -> Option<MarketQuote> {
        self.last_quote
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            running: self.running,
            symbol: self.instrument.symbol.clone(),
            instrument_name: self.instrument.name.clone(),
            frequency: self.instrument.frequency().to_string(),
            current_price: self.last_quote.map(|q| q.price),
            window_len: self.window.len(),
            window_capacity: self.window.capacity(),
            ticks_seen: self.ticks_seen,
            last_signal_at: self.gate.last_emitted_at(),
            recent_signals: self.recent.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc, Weekday};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn tick(session: &mut BotSession, price: f64, offset: i64) -> TickOutcome {
        let at = t0() + Duration::seconds(offset);
        let clock = ClockContext::at(at, 10, Weekday::Tue);
        let sample = PriceSample::new(price, at).unwrap();
        session.on_tick(sample, MarketQuote::new(price), &clock).unwrap()
    }

    #[test]
    fn test_stopped_session_only_buffers() {
        let mut session = BotSession::for_symbol("1HZ75V").unwrap();
        for i in 0..30 {
            assert!(matches!(tick(&mut session, 1000.0 + i as f64, i), TickOutcome::Idle));
        }
        assert_eq!(session.window().len(), 30);
        assert_eq!(session.status().ticks_seen, 30);
        assert_eq!(session.stats().total_evaluations, 0);
    }

    #[test]
    fn test_warmup_then_evaluation() {
        let mut session = BotSession::for_symbol("R_100").unwrap();
        session.start();
        for i in 0..19 {
            match tick(&mut session, 1000.0, i) {
                TickOutcome::Warmup { needed, available } => {
                    assert_eq!(needed, 20);
                    assert_eq!(available, i as usize + 1);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        // Flat prices: equal averages mean no trend
        assert!(matches!(tick(&mut session, 1000.0, 19), TickOutcome::Neutral(_)));
    }

    #[test]
    fn test_smooth_ramp_never_emits() {
        let mut session = BotSession::for_symbol("1HZ75V").unwrap();
        session.start();
        for i in 0..60 {
            let outcome = tick(&mut session, 100.0 + i as f64 * 0.01, i);
            assert!(!matches!(outcome, TickOutcome::Evaluated(_)));
        }
    }

    #[test]
    fn test_switch_clears_window_keeps_gate() {
        let mut session = BotSession::for_symbol("1HZ75V").unwrap();
        for i in 0..10 {
            tick(&mut session, 1000.0 + i as f64, i);
        }
        let gate_before = session.gate().last_emitted_at();

        let next = session.switch_instrument("R_50").unwrap();
        assert_eq!(next.symbol, "R_50");
        assert!(session.window().is_empty());
        assert_eq!(session.window().capacity(), 100);
        assert_eq!(session.gate().last_emitted_at(), gate_before);

        assert!(matches!(
            session.switch_instrument("NOPE"),
            Err(EngineError::InvalidInstrument(_))
        ));
        assert_eq!(session.instrument().symbol, "R_50");
    }

    #[test]
    fn test_start_stop() {
        let mut session = BotSession::for_symbol("R_10").unwrap();
        assert!(!session.is_running());
        session.start();
        session.start();
        assert!(session.status().running);
        session.stop();
        assert!(!session.is_running());
    }
}
