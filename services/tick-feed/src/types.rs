use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One price update for a subscribed index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub quote: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    /// Server time, seconds since the Unix epoch
    pub epoch: i64,
}

impl Tick {
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.epoch, 0).unwrap_or_else(Utc::now)
    }
}

/// Events published by the feed task
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected { symbol: String },
    Subscribed { symbol: String },
    Tick(Tick),
    /// The server rejected a request; the connection stays up
    ApiError { code: String, message: String },
    Disconnected { attempt: u32, reason: String },
    /// Reconnect attempts exhausted; no further events follow
    GaveUp { attempts: u32 },
}

/// Commands accepted by the feed task
#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    Subscribe(String),
    Shutdown,
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("WebSocket connection failed: {0}")]
    Connection(String),

    #[error("WebSocket disconnected: {0}")]
    Disconnected(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Failed to send request: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
