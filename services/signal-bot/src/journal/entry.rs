//! Journal line types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use signal_engine::{
    CandidateSignal, Direction, FilterVerdict, MarketQuote, Momentum, PriceAdjustments, Trend,
};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One journal file family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Signals,
    Activity,
    Market,
    Errors,
}

impl LogKind {
    pub const ALL: [LogKind; 4] = [
        LogKind::Signals,
        LogKind::Activity,
        LogKind::Market,
        LogKind::Errors,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            LogKind::Signals => "signals",
            LogKind::Activity => "activity",
            LogKind::Market => "market",
            LogKind::Errors => "errors",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signals" => Ok(LogKind::Signals),
            "activity" => Ok(LogKind::Activity),
            "market" => Ok(LogKind::Market),
            "errors" => Ok(LogKind::Errors),
            other => Err(format!(
                "unknown log type '{}' (expected signals, activity, market or errors)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalsEntry {
    pub rsi: f64,
    pub volatility: f64,
    pub trend: Trend,
    pub momentum: Momentum,
}

/// A filtered signal, approved or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub timestamp: DateTime<Utc>,
    pub signal_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Confidence before the filter ran
    pub confidence: u8,
    pub spread: f64,
    pub approved: bool,
    pub reason: String,
    pub filter_confidence: u8,
    pub filter_failed: bool,
    pub technicals: TechnicalsEntry,
    pub adjustments: Option<PriceAdjustments>,
}

impl SignalEntry {
    pub fn from_decision(
        signal: &CandidateSignal,
        verdict: &FilterVerdict,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let labels = &signal.technicals.labels;
        Self {
            timestamp,
            signal_id: signal.id,
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            confidence: verdict.diagnostics.original_confidence,
            spread: signal.spread,
            approved: verdict.approve,
            reason: verdict.reason.clone(),
            filter_confidence: verdict.confidence,
            filter_failed: verdict.filter_failed,
            technicals: TechnicalsEntry {
                rsi: signal.rsi(),
                volatility: signal.volatility(),
                trend: labels.trend,
                momentum: labels.momentum,
            },
            adjustments: verdict.adjustments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub level: ActivityLevel,
    pub message: String,
}

/// Sampled tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub spread: f64,
}

impl MarketEntry {
    pub fn from_quote(symbol: &str, quote: &MarketQuote, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            symbol: symbol.to_string(),
            price: quote.price,
            bid: quote.bid,
            ask: quote.ask,
            spread: quote.spread(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub error: String,
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!("Signals".parse::<LogKind>(), Ok(LogKind::Signals));
        assert_eq!(" errors ".parse::<LogKind>(), Ok(LogKind::Errors));
        assert!("trades".parse::<LogKind>().is_err());
        assert_eq!(LogKind::Market.to_string(), "market");
    }
}
