//! Technical indicators over a price sequence
//!
//! All functions are pure: the same slice always yields the same value.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::instrument::CadenceProfile;

pub const RSI_PERIOD: usize = 14;
pub const NEUTRAL_RSI: f64 = 50.0;

pub const SMA_FAST: usize = 5;
pub const SMA_MID: usize = 10;
pub const SMA_SLOW: usize = 20;

/// Simple moving average
pub fn sma(window: &[f64]) -> Result<f64> {
    if window.is_empty() {
        return Err(EngineError::InsufficientData {
            needed: 1,
            available: 0,
        });
    }
    Ok(window.iter().sum::<f64>() / window.len() as f64)
}

/// Relative Strength Index over the trailing `period` price changes
///
/// Returns [`NEUTRAL_RSI`] until `period` prices are available. Gains and
/// losses are averaged over the deltas actually present, so a window of
/// exactly `period` prices uses `period - 1` deltas.
pub fn rsi(window: &[f64], period: usize) -> f64 {
    if period == 0 || window.len() < period {
        return NEUTRAL_RSI;
    }

    let start = window.len().saturating_sub(period + 1);
    let tail = &window[start..];
    let deltas = tail.len() - 1;
    if deltas == 0 {
        return NEUTRAL_RSI;
    }

    let (gains, losses) = tail.windows(2).fold((0.0, 0.0), |(gain, loss), pair| {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            (gain + delta, loss)
        } else {
            (gain, loss - delta)
        }
    });

    let avg_gain = gains / deltas as f64;
    let avg_loss = losses / deltas as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

fn returns(window: &[f64]) -> Vec<f64> {
    window
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}

/// Realized volatility: population standard deviation of simple returns, in percent
pub fn volatility(window: &[f64]) -> Result<f64> {
    if window.len() < 2 {
        return Err(EngineError::InsufficientData {
            needed: 2,
            available: window.len(),
        });
    }

    let returns = returns(window);
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;

    Ok(variance.sqrt() * 100.0)
}

/// Percent change of the last price against the one before it
pub fn price_change_pct(window: &[f64]) -> Result<f64> {
    match window {
        [.., prev, last] => Ok((last - prev) / prev * 100.0),
        _ => Err(EngineError::InsufficientData {
            needed: 2,
            available: window.len(),
        }),
    }
}

/// Indicator values for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma_fast: f64,
    pub sma_mid: f64,
    pub sma_slow: f64,
    pub rsi: f64,
    pub volatility: f64,
    pub price_change_pct: f64,
}

impl IndicatorSnapshot {
    /// Compute all indicators from prices ordered oldest first
    pub fn compute(prices: &[f64], profile: &CadenceProfile) -> Result<Self> {
        let needed = profile.min_samples.max(SMA_SLOW);
        if prices.len() < needed {
            return Err(EngineError::InsufficientData {
                needed,
                available: prices.len(),
            });
        }

        let tail = |n: usize| &prices[prices.len().saturating_sub(n)..];
        let lookback = tail(profile.lookback);

        Ok(Self {
            sma_fast: sma(tail(SMA_FAST))?,
            sma_mid: sma(tail(SMA_MID))?,
            sma_slow: sma(tail(SMA_SLOW))?,
            rsi: rsi(lookback, RSI_PERIOD),
            volatility: volatility(lookback)?,
            price_change_pct: price_change_pct(prices)?,
        })
    }
}
