//! Builds candidate signals from the current price, indicators and labels

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use uuid::Uuid;

use crate::classifier::{ClassificationLabels, Direction, Momentum, PriceAction, VolatilityRegime};
use crate::context::MarketQuote;
use crate::error::{EngineError, Result};
use crate::indicators::IndicatorSnapshot;
use crate::instrument::{Cadence, InstrumentConfig};
use crate::signal::{CandidateSignal, Technicals};

/// Decimal places kept on price levels
pub const PRICE_DP: u32 = 5;

pub const DEFAULT_REASON: &str = "Technical Confluence";

pub fn to_price(value: f64) -> Result<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(PRICE_DP))
        .ok_or(EngineError::InvalidPrice(value))
}

fn risk_reward(instrument: &InstrumentConfig) -> String {
    let ratio = instrument
        .take_profit
        .checked_div(instrument.stop_loss)
        .and_then(|r| r.to_f64())
        .unwrap_or(0.0);
    format!("1:{:.1}", ratio)
}

fn build_reason(labels: &ClassificationLabels, direction: Direction, cadence: Cadence) -> String {
    let mut parts = Vec::new();

    if labels.trend.is_strong() {
        parts.push(format!("Strong {} trend confirmed", direction.as_str().to_lowercase()));
    }
    match (labels.momentum, direction) {
        (Momentum::Oversold, Direction::Bullish) => parts.push("Oversold bounce confluence".to_string()),
        (Momentum::Overbought, Direction::Bearish) => parts.push("Overbought rejection confluence".to_string()),
        _ => {}
    }
    let strong_move = labels.price_action == PriceAction::StrongMove;
    if labels.volatility_regime == VolatilityRegime::High && strong_move {
        parts.push("High volatility breakout".to_string());
    }
    if cadence == Cadence::Fast && strong_move {
        parts.push("1s scalping opportunity".to_string());
    }

    if parts.is_empty() {
        DEFAULT_REASON.to_string()
    } else {
        parts.join(" + ")
    }
}

/// Assemble an unevaluated signal for `direction` at the quoted price
pub fn assemble(
    instrument: &InstrumentConfig,
    quote: &MarketQuote,
    indicators: IndicatorSnapshot,
    labels: ClassificationLabels,
    direction: Direction,
    now: DateTime<Utc>,
) -> Result<CandidateSignal> {
    let entry_price = to_price(quote.price)?;
    let (stop_loss, take_profit) = match direction {
        Direction::Bullish => (
            entry_price - instrument.stop_loss,
            entry_price + instrument.take_profit,
        ),
        Direction::Bearish => (
            entry_price + instrument.stop_loss,
            entry_price - instrument.take_profit,
        ),
    };

    Ok(CandidateSignal {
        id: Uuid::new_v4(),
        symbol: instrument.symbol.clone(),
        instrument_name: instrument.name.clone(),
        frequency: instrument.frequency().to_string(),
        direction,
        entry_price,
        stop_loss,
        take_profit,
        confidence: labels.strength.floor().clamp(0.0, 100.0) as u8,
        risk_reward: risk_reward(instrument),
        risk_percent: instrument.risk_percent,
        technicals: Technicals { indicators, labels },
        reason: build_reason(&labels, direction, instrument.cadence),
        spread: quote.spread(),
        created_at: now,
        approved: false,
        filter_reason: None,
        filter_confidence: None,
        adjusted: false,
        evaluated_at: None,
    })
}
