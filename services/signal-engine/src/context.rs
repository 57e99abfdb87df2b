//! Market and wall-clock context handed to the filter

use chrono::{DateTime, Datelike, FixedOffset, Local, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Latest quote for the active instrument
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketQuote {
    pub price: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl MarketQuote {
    pub fn new(price: f64) -> Self {
        Self { price, bid: None, ask: None }
    }

    pub fn with_book(price: f64, bid: f64, ask: f64) -> Self {
        Self { price, bid: Some(bid), ask: Some(ask) }
    }

    /// Bid/ask spread as a percentage of mid, zero without a two-sided book
    pub fn spread(&self) -> f64 {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask > 0.0 => {
                let mid = (bid + ask) / 2.0;
                (ask - bid) / mid * 100.0
            }
            _ => 0.0,
        }
    }
}

/// Coarse label for the hour of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeCategory {
    Early,
    Peak,
    Evening,
    Night,
}

impl TimeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeCategory::Early => "Early",
            TimeCategory::Peak => "Peak",
            TimeCategory::Evening => "Evening",
            TimeCategory::Night => "Night",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Weekend,
    EarlyEuropean,
    European,
    Overlap,
    American,
    Asian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    VeryLow,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSession {
    pub session: Session,
    pub activity: Activity,
}

/// Wall-clock view used by time-of-day rules
///
/// `now` is the instant of evaluation; `hour` and `weekday` are taken in
/// whichever timezone the operator trades in (local by default).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockContext {
    pub now: DateTime<Utc>,
    pub hour: u32,
    pub weekday: Weekday,
}

impl ClockContext {
    pub fn local(now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&Local);
        Self {
            now,
            hour: local.hour(),
            weekday: local.weekday(),
        }
    }

    pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let shifted = now.with_timezone(&offset);
        Self {
            now,
            hour: shifted.hour(),
            weekday: shifted.weekday(),
        }
    }

    /// Explicit hour and weekday, mostly for tests
    pub fn at(now: DateTime<Utc>, hour: u32, weekday: Weekday) -> Self {
        Self { now, hour, weekday }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday, Weekday::Sat | Weekday::Sun)
    }

    pub fn is_night(&self) -> bool {
        self.hour >= 23 || self.hour <= 5
    }

    pub fn is_peak(&self) -> bool {
        (8..=16).contains(&self.hour)
    }

    pub fn time_category(&self) -> TimeCategory {
        match self.hour {
            6..=8 => TimeCategory::Early,
            9..=16 => TimeCategory::Peak,
            17..=21 => TimeCategory::Evening,
            _ => TimeCategory::Night,
        }
    }

    /// e.g. "10:00 (Peak)"
    pub fn time_analysis(&self) -> String {
        format!("{}:00 ({})", self.hour, self.time_category().as_str())
    }

    pub fn market_session(&self) -> MarketSession {
        if self.is_weekend() {
            return MarketSession { session: Session::Weekend, activity: Activity::VeryLow };
        }

        let (session, activity) = match self.hour {
            6..=8 => (Session::EarlyEuropean, Activity::Medium),
            9..=12 => (Session::European, Activity::High),
            13..=16 => (Session::Overlap, Activity::VeryHigh),
            17..=21 => (Session::American, Activity::High),
            _ => (Session::Asian, Activity::Medium),
        };
        MarketSession { session, activity }
    }
}
