//! Signal Engine
//!
//! Pure signal pipeline for synthetic volatility indices: rolling price
//! window, indicators, classification, emission gate, signal assembly and
//! the rule filter. No I/O happens in this crate.

pub mod assembler;
pub mod classifier;
pub mod context;
pub mod error;
pub mod filter;
pub mod gate;
pub mod indicators;
pub mod instrument;
pub mod session;
pub mod signal;
pub mod window;

pub use classifier::{ClassificationLabels, Direction, Momentum, PriceAction, Trend, VolatilityRegime};
pub use context::{ClockContext, MarketQuote, MarketSession};
pub use error::{EngineError, Result};
pub use filter::{FilterStats, FilterVerdict, PriceAdjustments, Rule, RuleFilter};
pub use gate::SignalGate;
pub use indicators::IndicatorSnapshot;
pub use instrument::{Cadence, InstrumentConfig};
pub use session::{BotSession, Decision, SessionStatus, TickOutcome};
pub use signal::CandidateSignal;
pub use window::{PriceSample, PriceWindow};
