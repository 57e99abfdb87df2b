//! Instrument catalog and cadence profiles
//!
//! Every threshold that depends on how fast an index ticks lives in
//! [`CadenceProfile`], so the classifier, gate and window never branch on
//! cadence themselves.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Tick cadence of a volatility index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// One tick per second ("1s" indices)
    Fast,
    /// One tick every two seconds
    Standard,
}

/// Cadence-dependent constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceProfile {
    pub window_capacity: usize,
    /// Number of trailing prices fed to RSI and volatility
    pub lookback: usize,
    pub min_samples: usize,
    pub high_volatility: f64,
    /// Absolute percent change that counts as a strong move
    pub strong_move_pct: f64,
    /// Strength must be strictly above this to emit
    pub emission_threshold: f64,
    pub min_interval_secs: i64,
    /// Fast indices penalize anything that is not a strong move
    pub weak_move_penalty: bool,
}

const FAST_PROFILE: CadenceProfile = CadenceProfile {
    window_capacity: 200,
    lookback: 50,
    min_samples: 20,
    high_volatility: 1.5,
    strong_move_pct: 0.05,
    emission_threshold: 60.0,
    min_interval_secs: 5 * 60,
    weak_move_penalty: true,
};

const STANDARD_PROFILE: CadenceProfile = CadenceProfile {
    window_capacity: 100,
    lookback: 30,
    min_samples: 20,
    high_volatility: 2.0,
    strong_move_pct: 0.1,
    emission_threshold: 70.0,
    min_interval_secs: 10 * 60,
    weak_move_penalty: false,
};

impl Cadence {
    pub fn profile(&self) -> &'static CadenceProfile {
        match self {
            Cadence::Fast => &FAST_PROFILE,
            Cadence::Standard => &STANDARD_PROFILE,
        }
    }

    /// Frequency label used in signals and notifications
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Fast => "1s",
            Cadence::Standard => "2s",
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::seconds(self.profile().min_interval_secs)
    }
}

/// Static description of a tradable index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub name: String,
    /// Stop-loss distance in price units
    pub stop_loss: Decimal,
    /// Take-profit distance in price units
    pub take_profit: Decimal,
    pub risk_percent: f64,
    pub cadence: Cadence,
}

impl InstrumentConfig {
    pub fn frequency(&self) -> &'static str {
        self.cadence.as_str()
    }
}

struct CatalogEntry {
    symbol: &'static str,
    name: &'static str,
    stop_loss: i64,
    take_profit: i64,
    risk_percent: f64,
    cadence: Cadence,
}

impl CatalogEntry {
    fn to_config(&self) -> InstrumentConfig {
        InstrumentConfig {
            symbol: self.symbol.to_string(),
            name: self.name.to_string(),
            stop_loss: Decimal::from(self.stop_loss),
            take_profit: Decimal::from(self.take_profit),
            risk_percent: self.risk_percent,
            cadence: self.cadence,
        }
    }
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry { symbol: "1HZ10V", name: "Volatility 10 (1s) Index", stop_loss: 10, take_profit: 25, risk_percent: 1.0, cadence: Cadence::Fast },
    CatalogEntry { symbol: "1HZ25V", name: "Volatility 25 (1s) Index", stop_loss: 25, take_profit: 60, risk_percent: 1.5, cadence: Cadence::Fast },
    CatalogEntry { symbol: "1HZ50V", name: "Volatility 50 (1s) Index", stop_loss: 50, take_profit: 125, risk_percent: 2.0, cadence: Cadence::Fast },
    CatalogEntry { symbol: "1HZ75V", name: "Volatility 75 (1s) Index", stop_loss: 100, take_profit: 250, risk_percent: 2.2, cadence: Cadence::Fast },
    CatalogEntry { symbol: "1HZ100V", name: "Volatility 100 (1s) Index", stop_loss: 150, take_profit: 375, risk_percent: 2.5, cadence: Cadence::Fast },
    CatalogEntry { symbol: "R_10", name: "Volatility 10 Index", stop_loss: 10, take_profit: 25, risk_percent: 1.0, cadence: Cadence::Standard },
    CatalogEntry { symbol: "R_25", name: "Volatility 25 Index", stop_loss: 25, take_profit: 60, risk_percent: 1.5, cadence: Cadence::Standard },
    CatalogEntry { symbol: "R_50", name: "Volatility 50 Index", stop_loss: 50, take_profit: 125, risk_percent: 2.0, cadence: Cadence::Standard },
    CatalogEntry { symbol: "R_75", name: "Volatility 75 Index", stop_loss: 100, take_profit: 250, risk_percent: 2.2, cadence: Cadence::Standard },
    CatalogEntry { symbol: "R_100", name: "Volatility 100 Index", stop_loss: 150, take_profit: 375, risk_percent: 2.5, cadence: Cadence::Standard },
];

/// Symbol the bot starts on when nothing else is configured
pub const DEFAULT_SYMBOL: &str = "1HZ75V";

/// Look up an instrument by symbol (case-insensitive)
pub fn find(symbol: &str) -> Result<InstrumentConfig> {
    CATALOG
        .iter()
        .find(|entry| entry.symbol.eq_ignore_ascii_case(symbol.trim()))
        .map(CatalogEntry::to_config)
        .ok_or_else(|| EngineError::InvalidInstrument(symbol.to_string()))
}

/// All supported instruments in catalog order
pub fn all() -> Vec<InstrumentConfig> {
    CATALOG.iter().map(CatalogEntry::to_config).collect()
}
