//! Signal classification: trend, momentum, volatility regime and price action
//! labels plus a composite strength score.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::indicators::IndicatorSnapshot;
use crate::instrument::Cadence;

const BASE_STRENGTH: f64 = 50.0;
const OVERBOUGHT: f64 = 70.0;
const OVERSOLD: f64 = 30.0;
const LOW_VOLATILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    StrongBullish,
    Bullish,
    StrongBearish,
    Bearish,
    Neutral,
}

impl Trend {
    pub fn is_strong(&self) -> bool {
        matches!(self, Trend::StrongBullish | Trend::StrongBearish)
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Trend::StrongBullish | Trend::Bullish => Some(Direction::Bullish),
            Trend::StrongBearish | Trend::Bearish => Some(Direction::Bearish),
            Trend::Neutral => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::StrongBullish => "STRONG_BULLISH",
            Trend::Bullish => "BULLISH",
            Trend::StrongBearish => "STRONG_BEARISH",
            Trend::Bearish => "BEARISH",
            Trend::Neutral => "NEUTRAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Momentum {
    Overbought,
    Oversold,
    Neutral,
}

impl Momentum {
    pub fn as_str(&self) -> &'static str {
        match self {
            Momentum::Overbought => "OVERBOUGHT",
            Momentum::Oversold => "OVERSOLD",
            Momentum::Neutral => "NEUTRAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityRegime {
    High,
    Normal,
    Low,
}

impl VolatilityRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityRegime::High => "HIGH",
            VolatilityRegime::Normal => "NORMAL",
            VolatilityRegime::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceAction {
    StrongMove,
    WeakMove,
}

/// Signal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "BULLISH",
            Direction::Bearish => "BEARISH",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels derived from one indicator snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationLabels {
    pub trend: Trend,
    pub momentum: Momentum,
    pub volatility_regime: VolatilityRegime,
    pub price_action: PriceAction,
    /// Composite score in [0, 100]
    pub strength: f64,
}

impl ClassificationLabels {
    pub fn direction(&self) -> Option<Direction> {
        self.trend.direction()
    }

    /// True when the score clears the cadence threshold and a direction exists
    pub fn is_actionable(&self, cadence: Cadence) -> bool {
        self.strength > cadence.profile().emission_threshold && self.direction().is_some()
    }
}

pub fn classify_trend(snapshot: &IndicatorSnapshot) -> Trend {
    let IndicatorSnapshot { sma_fast: fast, sma_mid: mid, sma_slow: slow, .. } = *snapshot;

    if fast > mid && mid > slow {
        Trend::StrongBullish
    } else if fast > mid {
        Trend::Bullish
    } else if fast < mid && mid < slow {
        Trend::StrongBearish
    } else if fast < mid {
        Trend::Bearish
    } else {
        Trend::Neutral
    }
}

pub fn classify_momentum(rsi: f64) -> Momentum {
    if rsi > OVERBOUGHT {
        Momentum::Overbought
    } else if rsi < OVERSOLD {
        Momentum::Oversold
    } else {
        Momentum::Neutral
    }
}

pub fn classify_volatility(volatility: f64, cadence: Cadence) -> VolatilityRegime {
    if volatility > cadence.profile().high_volatility {
        VolatilityRegime::High
    } else if volatility < LOW_VOLATILITY {
        VolatilityRegime::Low
    } else {
        VolatilityRegime::Normal
    }
}

pub fn classify_price_action(price_change_pct: f64, cadence: Cadence) -> PriceAction {
    if price_change_pct.abs() > cadence.profile().strong_move_pct {
        PriceAction::StrongMove
    } else {
        PriceAction::WeakMove
    }
}

fn strength(
    trend: Trend,
    momentum: Momentum,
    regime: VolatilityRegime,
    action: PriceAction,
    cadence: Cadence,
) -> f64 {
    let mut score = BASE_STRENGTH;

    if trend.is_strong() {
        score += 20.0;
    } else if trend != Trend::Neutral {
        score += 10.0;
    }

    // Reversal confluence
    match (momentum, trend.direction()) {
        (Momentum::Oversold, Some(Direction::Bullish))
        | (Momentum::Overbought, Some(Direction::Bearish)) => score += 15.0,
        _ => {}
    }

    if regime == VolatilityRegime::High && action == PriceAction::StrongMove {
        score += 10.0;
    }
    if regime == VolatilityRegime::Low {
        score -= 20.0;
    }
    if cadence.profile().weak_move_penalty && action != PriceAction::StrongMove {
        score -= 10.0;
    }

    score.clamp(0.0, 100.0)
}

/// Label a snapshot and score it
pub fn classify(snapshot: &IndicatorSnapshot, cadence: Cadence) -> ClassificationLabels {
    let trend = classify_trend(snapshot);
    let momentum = classify_momentum(snapshot.rsi);
    let volatility_regime = classify_volatility(snapshot.volatility, cadence);
    let price_action = classify_price_action(snapshot.price_change_pct, cadence);

    ClassificationLabels {
        trend,
        momentum,
        volatility_regime,
        price_action,
        strength: strength(trend, momentum, volatility_regime, price_action, cadence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(fast: f64, mid: f64, slow: f64, rsi: f64, vol: f64, change: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            sma_fast: fast,
            sma_mid: mid,
            sma_slow: slow,
            rsi,
            volatility: vol,
            price_change_pct: change,
        }
    }

    #[test]
    fn test_trend_labels() {
        assert_eq!(classify_trend(&snapshot(3.0, 2.0, 1.0, 50.0, 1.0, 0.0)), Trend::StrongBullish);
        assert_eq!(classify_trend(&snapshot(3.0, 2.0, 2.5, 50.0, 1.0, 0.0)), Trend::Bullish);
        assert_eq!(classify_trend(&snapshot(1.0, 2.0, 3.0, 50.0, 1.0, 0.0)), Trend::StrongBearish);
        assert_eq!(classify_trend(&snapshot(1.0, 2.0, 1.5, 50.0, 1.0, 0.0)), Trend::Bearish);
        assert_eq!(classify_trend(&snapshot(2.0, 2.0, 1.0, 50.0, 1.0, 0.0)), Trend::Neutral);
    }

    #[test]
    fn test_momentum_and_regime() {
        assert_eq!(classify_momentum(70.0), Momentum::Neutral);
        assert_eq!(classify_momentum(70.1), Momentum::Overbought);
        assert_eq!(classify_momentum(29.9), Momentum::Oversold);

        assert_eq!(classify_volatility(1.6, Cadence::Fast), VolatilityRegime::High);
        assert_eq!(classify_volatility(1.6, Cadence::Standard), VolatilityRegime::Normal);
        assert_eq!(classify_volatility(0.3, Cadence::Standard), VolatilityRegime::Low);
    }

    #[test]
    fn test_price_action_thresholds() {
        assert_eq!(classify_price_action(-0.06, Cadence::Fast), PriceAction::StrongMove);
        assert_eq!(classify_price_action(0.06, Cadence::Standard), PriceAction::WeakMove);
        assert_eq!(classify_price_action(0.11, Cadence::Standard), PriceAction::StrongMove);
    }

    #[test]
    fn test_strength_strong_trend_fast_cadence() {
        // 50 + 20, no penalty because the move is strong
        let labels = classify(&snapshot(3.0, 2.0, 1.0, 65.0, 1.15, 1.5), Cadence::Fast);
        assert_eq!(labels.strength, 70.0);
        assert!(labels.is_actionable(Cadence::Fast));
        assert!(!labels.is_actionable(Cadence::Standard));
    }

    #[test]
    fn test_strength_reversal_confluence_and_breakout() {
        // 50 + 10 + 15 + 10
        let labels = classify(&snapshot(1.0, 2.0, 1.5, 75.0, 2.5, -0.2), Cadence::Standard);
        assert_eq!(labels.trend, Trend::Bearish);
        assert_eq!(labels.momentum, Momentum::Overbought);
        assert_eq!(labels.strength, 85.0);
        assert_eq!(labels.direction(), Some(Direction::Bearish));
    }

    #[test]
    fn test_smooth_ramp_is_penalized() {
        // Low volatility and a weak move on a fast index: 50 + 20 - 20 - 10
        let labels = classify(&snapshot(3.0, 2.0, 1.0, 100.0, 0.0, 0.01), Cadence::Fast);
        assert_eq!(labels.trend, Trend::StrongBullish);
        assert_eq!(labels.momentum, Momentum::Overbought);
        assert_eq!(labels.volatility_regime, VolatilityRegime::Low);
        assert_eq!(labels.strength, 40.0);
        assert!(!labels.is_actionable(Cadence::Fast));
    }

    #[test]
    fn test_neutral_trend_never_actionable() {
        let labels = classify(&snapshot(2.0, 2.0, 2.0, 20.0, 3.0, 0.5), Cadence::Fast);
        assert_eq!(labels.trend, Trend::Neutral);
        assert_eq!(labels.direction(), None);
        assert!(!labels.is_actionable(Cadence::Fast));
    }

    #[test]
    fn test_labels_serialize_screaming_snake() {
        let json = serde_json::to_string(&Trend::StrongBullish).unwrap();
        assert_eq!(json, "\"STRONG_BULLISH\"");
        let json = serde_json::to_string(&PriceAction::StrongMove).unwrap();
        assert_eq!(json, "\"STRONG_MOVE\"");
    }
}
