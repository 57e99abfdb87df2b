//! Candidate signal record

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::{ClassificationLabels, Direction};
use crate::filter::FilterVerdict;
use crate::indicators::IndicatorSnapshot;

/// Indicator values and labels captured when the signal was built
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Technicals {
    pub indicators: IndicatorSnapshot,
    pub labels: ClassificationLabels,
}

/// A directional signal moving through the filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSignal {
    pub id: Uuid,
    pub symbol: String,
    pub instrument_name: String,
    pub frequency: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub confidence: u8,
    /// "1:X.X"
    pub risk_reward: String,
    pub risk_percent: f64,
    pub technicals: Technicals,
    pub reason: String,
    pub spread: f64,
    pub created_at: DateTime<Utc>,

    pub approved: bool,
    pub filter_reason: Option<String>,
    pub filter_confidence: Option<u8>,
    pub adjusted: bool,
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl CandidateSignal {
    pub fn rsi(&self) -> f64 {
        self.technicals.indicators.rsi
    }

    pub fn volatility(&self) -> f64 {
        self.technicals.indicators.volatility
    }

    /// Fold a filter verdict into the signal
    pub fn apply_verdict(&mut self, verdict: &FilterVerdict, now: DateTime<Utc>) {
        self.approved = verdict.approve;
        self.confidence = verdict.confidence;
        self.filter_confidence = Some(verdict.confidence);
        self.filter_reason = Some(verdict.reason.clone());
        self.evaluated_at = Some(now);

        if let Some(adjustments) = &verdict.adjustments {
            if let Some(take_profit) = adjustments.take_profit {
                self.take_profit = take_profit;
                self.adjusted = true;
            }
            if let Some(stop_loss) = adjustments.stop_loss {
                self.stop_loss = stop_loss;
                self.adjusted = true;
            }
        }
    }
}
