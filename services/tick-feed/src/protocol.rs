//! Deriv WebSocket API messages used by the feed

use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::{FeedError, Result, Tick};

pub const DEFAULT_ENDPOINT: &str = "wss://ws.binaryws.com/websockets/v3";
pub const DEFAULT_APP_ID: u32 = 1089;

/// Build the connection URL for an app id
pub fn endpoint_url(base: &str, app_id: u32) -> Result<url::Url> {
    let mut url = url::Url::parse(base)
        .map_err(|e| FeedError::Connection(format!("Invalid feed URL {}: {}", base, e)))?;
    url.query_pairs_mut().append_pair("app_id", &app_id.to_string());
    Ok(url)
}

/// Cancel every active tick stream
pub fn forget_all_ticks() -> Value {
    json!({ "forget_all": "ticks" })
}

pub fn subscribe_ticks(symbol: &str) -> Value {
    json!({ "ticks": symbol, "subscribe": 1 })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    msg_type: Option<String>,
    tick: Option<RawTick>,
    error: Option<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawTick {
    symbol: String,
    quote: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    epoch: i64,
}

#[derive(Debug, Deserialize)]
struct RawError {
    code: String,
    message: String,
}

/// Decoded server message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Tick(Tick),
    /// Acknowledgement or message type the feed does not consume
    Other(String),
}

/// Decode one text frame
///
/// Server-side errors come back as [`FeedError::Api`]; ticks with a
/// non-finite or non-positive quote are rejected as invalid.
pub fn parse_message(text: &str) -> Result<Inbound> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| FeedError::InvalidMessage(e.to_string()))?;

    if let Some(error) = envelope.error {
        return Err(FeedError::Api {
            code: error.code,
            message: error.message,
        });
    }

    match envelope.tick {
        Some(raw) => {
            if !raw.quote.is_finite() || raw.quote <= 0.0 {
                return Err(FeedError::InvalidMessage(format!(
                    "Bad quote {} for {}",
                    raw.quote, raw.symbol
                )));
            }
            Ok(Inbound::Tick(Tick {
                symbol: raw.symbol,
                quote: raw.quote,
                bid: raw.bid,
                ask: raw.ask,
                epoch: raw.epoch,
            }))
        }
        None => Ok(Inbound::Other(envelope.msg_type.unwrap_or_default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick() {
        let text = r#"{
            "echo_req": {"ticks": "1HZ75V", "subscribe": 1},
            "msg_type": "tick",
            "subscription": {"id": "b1c2"},
            "tick": {"ask": 4211.62, "bid": 4211.42, "epoch": 1709632800, "id": "b1c2",
                     "pip_size": 2, "quote": 4211.52, "symbol": "1HZ75V"}
        }"#;

        match parse_message(text).unwrap() {
            Inbound::Tick(tick) => {
                assert_eq!(tick.symbol, "1HZ75V");
                assert_eq!(tick.quote, 4211.52);
                assert_eq!(tick.bid, Some(4211.42));
                assert_eq!(tick.timestamp().timestamp(), 1709632800);
            }
            other => panic!("expected tick, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let text = r#"{"error": {"code": "InvalidSymbol", "message": "Symbol XYZ is invalid."}, "msg_type": "tick"}"#;
        match parse_message(text) {
            Err(FeedError::Api { code, .. }) => assert_eq!(code, "InvalidSymbol"),
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ack_and_garbage() {
        let ack = r#"{"forget_all": [], "msg_type": "forget_all"}"#;
        assert_eq!(parse_message(ack).unwrap(), Inbound::Other("forget_all".to_string()));
        assert!(matches!(parse_message("not json"), Err(FeedError::InvalidMessage(_))));

        let bad = r#"{"msg_type": "tick", "tick": {"symbol": "R_10", "quote": -1.0, "epoch": 1}}"#;
        assert!(matches!(parse_message(bad), Err(FeedError::InvalidMessage(_))));
    }

    #[test]
    fn test_requests() {
        assert_eq!(forget_all_ticks().to_string(), r#"{"forget_all":"ticks"}"#);
        let sub = subscribe_ticks("R_50");
        assert_eq!(sub["ticks"], "R_50");
        assert_eq!(sub["subscribe"], 1);

        let url = endpoint_url(DEFAULT_ENDPOINT, DEFAULT_APP_ID).unwrap();
        assert_eq!(url.as_str(), "wss://ws.binaryws.com/websockets/v3?app_id=1089");
    }
}
