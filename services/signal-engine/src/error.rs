use thiserror::Error;

/// Errors raised by the signal pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Insufficient data: need {needed} prices, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Unknown instrument: {0}")]
    InvalidInstrument(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    #[error("Filter internal error: {0}")]
    FilterInternal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
