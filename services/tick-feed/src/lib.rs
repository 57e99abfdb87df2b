//! Tick Feed
//!
//! Streams real-time ticks for Deriv volatility indices over WebSocket and
//! publishes them as [`FeedEvent`]s on a channel. Reconnection uses a fixed
//! delay and a bounded number of attempts.

pub mod deriv;
pub mod protocol;
pub mod supervisor;
pub mod types;

pub use deriv::{DerivConnection, DerivConnector};
pub use supervisor::{run_feed, spawn_feed, Connection, Connector, FeedHandle, ReconnectPolicy};
pub use types::*;
