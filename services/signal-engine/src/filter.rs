//! Rule-based signal filter
//!
//! A [`RuleFilter`] holds an ordered list of independent [`Rule`]s. Each rule
//! inspects the candidate and returns zero or more [`RuleEffect`]s, which are
//! folded left to right into an [`Evaluation`]. Screening rules always run so
//! every applicable rejection reason is collected; confidence and target
//! rules only run while the signal is still approved.
//!
//! The filter never fails closed: if evaluation breaks, the original signal
//! is approved with its own confidence.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::assembler::PRICE_DP;
use crate::classifier::{Direction, Momentum, Trend};
use crate::context::{ClockContext, MarketQuote, MarketSession};
use crate::error::{EngineError, Result};
use crate::signal::CandidateSignal;

pub const DEFAULT_APPROVAL_REASON: &str = "Signal approved by AI";
pub const FAIL_OPEN_REASON: &str = "Rule filter failed - using original signal";
const REASON_SEPARATOR: &str = " | ";

const MIN_VOLATILITY: f64 = 0.4;
const MAX_SPREAD: f64 = 0.008;
const EXTREME_OVERBOUGHT: f64 = 78.0;
const EXTREME_OVERSOLD: f64 = 22.0;
const NIGHT_PENALTY: f64 = 25.0;
const NIGHT_FLOOR: f64 = 40.0;
const NIGHT_MIN_CONFIDENCE: f64 = 60.0;
const TAKE_PROFIT_SHRINK: f64 = 0.7;
const STOP_LOSS_WIDEN: f64 = 1.2;

/// When a rule runs relative to the approval state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Always evaluated
    Screen,
    /// Skipped once rejected
    Confidence,
    /// Skipped once rejected
    Targets,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Floor(f64),
    Cap(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleEffect {
    Reject(String),
    Confidence { delta: f64, bound: Bound, reason: String },
    TakeProfit { price: Decimal, reason: String },
    StopLoss { price: Decimal, reason: String },
}

/// Inputs visible to every rule
pub struct RuleContext<'a> {
    pub signal: &'a CandidateSignal,
    pub market: &'a MarketQuote,
    pub clock: &'a ClockContext,
}

impl RuleContext<'_> {
    fn is_bullish(&self) -> bool {
        self.signal.direction == Direction::Bullish
    }

    fn trend(&self) -> Trend {
        self.signal.technicals.labels.trend
    }

    fn momentum(&self) -> Momentum {
        self.signal.technicals.labels.momentum
    }

    fn spread(&self) -> f64 {
        self.signal.spread.max(self.market.spread())
    }
}

pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;
    fn stage(&self) -> Stage;
    fn apply(&self, ctx: &RuleContext<'_>, current: &Evaluation) -> Vec<RuleEffect>;
}

/// Running state of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub approve: bool,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

impl Evaluation {
    fn start(confidence: u8) -> Self {
        Self {
            approve: true,
            confidence: f64::from(confidence),
            reasons: Vec::new(),
            take_profit: None,
            stop_loss: None,
        }
    }

    fn fold(&mut self, effect: RuleEffect) {
        match effect {
            RuleEffect::Reject(reason) => {
                self.approve = false;
                self.reasons.push(reason);
            }
            RuleEffect::Confidence { delta, bound, reason } => {
                let raw = self.confidence + delta;
                self.confidence = match bound {
                    Bound::Floor(floor) => raw.max(floor),
                    Bound::Cap(cap) => raw.min(cap),
                };
                self.reasons.push(reason);
            }
            RuleEffect::TakeProfit { price, reason } => {
                self.take_profit = Some(price);
                self.reasons.push(reason);
            }
            RuleEffect::StopLoss { price, reason } => {
                self.stop_loss = Some(price);
                self.reasons.push(reason);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceAdjustments {
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDiagnostics {
    pub volatility_level: f64,
    pub rsi_level: f64,
    pub time_analysis: String,
    pub session: MarketSession,
    pub original_confidence: u8,
    pub adjusted_confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterVerdict {
    pub approve: bool,
    pub confidence: u8,
    pub reason: String,
    pub adjustments: Option<PriceAdjustments>,
    pub diagnostics: FilterDiagnostics,
    /// Set when the verdict is a fail-open fallback
    pub filter_failed: bool,
}

impl FilterVerdict {
    pub fn is_adjusted(&self) -> bool {
        self.adjustments.is_some()
    }
}

// --- Screening rules ---

struct MinVolatility;

impl Rule for MinVolatility {
    fn name(&self) -> &'static str {
        "min_volatility"
    }
    fn stage(&self) -> Stage {
        Stage::Screen
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        if ctx.signal.volatility() < MIN_VOLATILITY {
            vec![RuleEffect::Reject("Ultra-low volatility detected (< 0.4%)".to_string())]
        } else {
            vec![]
        }
    }
}

struct MaxSpread;

impl Rule for MaxSpread {
    fn name(&self) -> &'static str {
        "max_spread"
    }
    fn stage(&self) -> Stage {
        Stage::Screen
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        if ctx.spread() > MAX_SPREAD {
            vec![RuleEffect::Reject(
                "Spread too wide for reliable execution (> 0.008)".to_string(),
            )]
        } else {
            vec![]
        }
    }
}

struct ReversalRisk;

impl Rule for ReversalRisk {
    fn name(&self) -> &'static str {
        "reversal_risk"
    }
    fn stage(&self) -> Stage {
        Stage::Screen
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        let rsi = ctx.signal.rsi();
        if rsi > EXTREME_OVERBOUGHT && ctx.is_bullish() {
            vec![RuleEffect::Reject(
                "RSI severely overbought + bullish signal = high reversal risk".to_string(),
            )]
        } else if rsi < EXTREME_OVERSOLD && !ctx.is_bullish() {
            vec![RuleEffect::Reject(
                "RSI severely oversold + bearish signal = high reversal risk".to_string(),
            )]
        } else {
            vec![]
        }
    }
}

struct Weekend;

impl Rule for Weekend {
    fn name(&self) -> &'static str {
        "weekend"
    }
    fn stage(&self) -> Stage {
        Stage::Screen
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        if ctx.clock.is_weekend() {
            vec![RuleEffect::Reject("Weekend trading - low liquidity".to_string())]
        } else {
            vec![]
        }
    }
}

struct NightHours;

impl Rule for NightHours {
    fn name(&self) -> &'static str {
        "night_hours"
    }
    fn stage(&self) -> Stage {
        Stage::Screen
    }
    fn apply(&self, ctx: &RuleContext<'_>, current: &Evaluation) -> Vec<RuleEffect> {
        if !ctx.clock.is_night() {
            return vec![];
        }

        let mut effects = vec![RuleEffect::Confidence {
            delta: -NIGHT_PENALTY,
            bound: Bound::Floor(NIGHT_FLOOR),
            reason: "Low activity hours - reduced confidence".to_string(),
        }];
        let penalized = (current.confidence - NIGHT_PENALTY).max(NIGHT_FLOOR);
        if penalized < NIGHT_MIN_CONFIDENCE {
            effects.push(RuleEffect::Reject("Confidence too low for night trading".to_string()));
        }
        effects
    }
}

struct DirectionalBias;

impl Rule for DirectionalBias {
    fn name(&self) -> &'static str {
        "directional_bias"
    }
    fn stage(&self) -> Stage {
        Stage::Screen
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        if ctx.trend() == Trend::Neutral && ctx.momentum() == Momentum::Neutral {
            vec![RuleEffect::Reject(
                "No clear directional bias - conflicting signals".to_string(),
            )]
        } else {
            vec![]
        }
    }
}

// --- Confidence rules ---

struct TrendQuality;

impl Rule for TrendQuality {
    fn name(&self) -> &'static str {
        "trend_quality"
    }
    fn stage(&self) -> Stage {
        Stage::Confidence
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        let rsi = ctx.signal.rsi();
        let mut effects = Vec::new();

        if ctx.trend().is_strong() && rsi > 30.0 && rsi < 70.0 {
            effects.push(RuleEffect::Confidence {
                delta: 8.0,
                bound: Bound::Cap(95.0),
                reason: "Strong trend + healthy RSI = high confidence".to_string(),
            });
        }
        if ctx.momentum() == Momentum::Neutral && !ctx.trend().is_strong() {
            effects.push(RuleEffect::Confidence {
                delta: -10.0,
                bound: Bound::Floor(50.0),
                reason: "Weak momentum reduces confidence".to_string(),
            });
        }
        effects
    }
}

struct PeakHours;

impl Rule for PeakHours {
    fn name(&self) -> &'static str {
        "peak_hours"
    }
    fn stage(&self) -> Stage {
        Stage::Confidence
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        if ctx.clock.is_peak() {
            vec![RuleEffect::Confidence {
                delta: 5.0,
                bound: Bound::Cap(98.0),
                reason: "Peak trading hours boost".to_string(),
            }]
        } else {
            vec![]
        }
    }
}

struct VolatilityBand;

impl Rule for VolatilityBand {
    fn name(&self) -> &'static str {
        "volatility_band"
    }
    fn stage(&self) -> Stage {
        Stage::Confidence
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        let vol = ctx.signal.volatility();
        if vol > 2.5 {
            vec![RuleEffect::Confidence {
                delta: -5.0,
                bound: Bound::Floor(50.0),
                reason: "High volatility increases risk".to_string(),
            }]
        } else if vol > 1.0 && vol < 2.0 {
            vec![RuleEffect::Confidence {
                delta: 3.0,
                bound: Bound::Cap(95.0),
                reason: "Optimal volatility range".to_string(),
            }]
        } else {
            vec![]
        }
    }
}

// --- Target rules ---

/// Move `level` so its distance from entry is scaled by `factor`, keeping its side
fn rescale(entry: Decimal, level: Decimal, factor: f64) -> Option<Decimal> {
    let factor = Decimal::from_f64(factor)?;
    let distance = (level - entry).abs() * factor;
    let moved = if level >= entry { entry + distance } else { entry - distance };
    Some(moved.round_dp(PRICE_DP))
}

struct ExtremeZoneTarget;

impl Rule for ExtremeZoneTarget {
    fn name(&self) -> &'static str {
        "extreme_zone_target"
    }
    fn stage(&self) -> Stage {
        Stage::Targets
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        let rsi = ctx.signal.rsi();
        let stretched = (rsi > 65.0 && ctx.is_bullish()) || (rsi < 35.0 && !ctx.is_bullish());
        if !stretched {
            return vec![];
        }

        let signal = ctx.signal;
        rescale(signal.entry_price, signal.take_profit, TAKE_PROFIT_SHRINK)
            .map(|price| RuleEffect::TakeProfit {
                price,
                reason: "TP adjusted for RSI extreme zone".to_string(),
            })
            .into_iter()
            .collect()
    }
}

struct VolatileStop;

impl Rule for VolatileStop {
    fn name(&self) -> &'static str {
        "volatile_stop"
    }
    fn stage(&self) -> Stage {
        Stage::Targets
    }
    fn apply(&self, ctx: &RuleContext<'_>, _: &Evaluation) -> Vec<RuleEffect> {
        if ctx.signal.volatility() <= 2.0 {
            return vec![];
        }

        let signal = ctx.signal;
        rescale(signal.entry_price, signal.stop_loss, STOP_LOSS_WIDEN)
            .map(|price| RuleEffect::StopLoss {
                price,
                reason: "SL widened for high volatility".to_string(),
            })
            .into_iter()
            .collect()
    }
}

/// Ordered rule set applied to every candidate signal
pub struct RuleFilter {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RuleFilter {
    fn default() -> Self {
        Self::new(vec![
            Box::new(MinVolatility),
            Box::new(MaxSpread),
            Box::new(ReversalRisk),
            Box::new(Weekend),
            Box::new(NightHours),
            Box::new(DirectionalBias),
            Box::new(TrendQuality),
            Box::new(PeakHours),
            Box::new(VolatilityBand),
            Box::new(ExtremeZoneTarget),
            Box::new(VolatileStop),
        ])
    }
}

impl RuleFilter {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Evaluate a signal, falling back to approval if evaluation fails
    pub fn evaluate(
        &self,
        signal: &CandidateSignal,
        market: &MarketQuote,
        clock: &ClockContext,
    ) -> FilterVerdict {
        match self.try_evaluate(signal, market, clock) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(signal_id = %signal.id, "Rule filter failed, passing signal through: {}", e);
                fail_open(signal, clock)
            }
        }
    }

    pub fn try_evaluate(
        &self,
        signal: &CandidateSignal,
        market: &MarketQuote,
        clock: &ClockContext,
    ) -> Result<FilterVerdict> {
        let inputs = [signal.rsi(), signal.volatility(), signal.spread, market.spread()];
        if inputs.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::FilterInternal(format!(
                "non-finite filter input: rsi={} volatility={} spread={}",
                signal.rsi(),
                signal.volatility(),
                signal.spread
            )));
        }

        let ctx = RuleContext { signal, market, clock };
        let mut eval = Evaluation::start(signal.confidence);

        for rule in &self.rules {
            if rule.stage() != Stage::Screen && !eval.approve {
                continue;
            }
            for effect in rule.apply(&ctx, &eval) {
                eval.fold(effect);
            }
        }

        let confidence = eval.confidence.round();
        if !confidence.is_finite() {
            return Err(EngineError::FilterInternal(format!(
                "confidence diverged: {}",
                eval.confidence
            )));
        }
        let confidence = confidence.clamp(0.0, 100.0) as u8;

        let reason = if eval.reasons.is_empty() {
            DEFAULT_APPROVAL_REASON.to_string()
        } else {
            eval.reasons.join(REASON_SEPARATOR)
        };

        let adjustments = (eval.take_profit.is_some() || eval.stop_loss.is_some()).then_some(
            PriceAdjustments {
                take_profit: eval.take_profit,
                stop_loss: eval.stop_loss,
            },
        );

        Ok(FilterVerdict {
            approve: eval.approve,
            confidence,
            reason,
            adjustments,
            diagnostics: diagnostics(signal, clock, confidence),
            filter_failed: false,
        })
    }
}

fn diagnostics(signal: &CandidateSignal, clock: &ClockContext, adjusted: u8) -> FilterDiagnostics {
    FilterDiagnostics {
        volatility_level: signal.volatility(),
        rsi_level: signal.rsi(),
        time_analysis: clock.time_analysis(),
        session: clock.market_session(),
        original_confidence: signal.confidence,
        adjusted_confidence: adjusted,
    }
}

fn fail_open(signal: &CandidateSignal, clock: &ClockContext) -> FilterVerdict {
    FilterVerdict {
        approve: true,
        confidence: signal.confidence,
        reason: FAIL_OPEN_REASON.to_string(),
        adjustments: None,
        diagnostics: diagnostics(signal, clock, signal.confidence),
        filter_failed: true,
    }
}

/// Running approval counters across evaluations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    pub total_evaluations: u64,
    pub approved_signals: u64,
    pub rejected_signals: u64,
    pub adjusted_signals: u64,
    pub failed_evaluations: u64,
}

impl FilterStats {
    pub fn record(&mut self, verdict: &FilterVerdict) {
        self.total_evaluations += 1;
        if verdict.approve {
            self.approved_signals += 1;
        } else {
            self.rejected_signals += 1;
        }
        if verdict.is_adjusted() {
            self.adjusted_signals += 1;
        }
        if verdict.filter_failed {
            self.failed_evaluations += 1;
        }
    }

    /// Approved share of all evaluations, e.g. "62.5%"
    pub fn approval_rate(&self) -> String {
        rate(self.approved_signals, self.total_evaluations)
    }

    /// Adjusted share of approved signals
    pub fn adjustment_rate(&self) -> String {
        rate(self.adjusted_signals, self.approved_signals)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn rate(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", part as f64 / whole as f64 * 100.0)
}
