//! Deriv WebSocket connection

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::protocol::{self, Inbound};
use crate::supervisor::{Connection, Connector};
use crate::types::{FeedError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Pause between cancelling old streams and subscribing to the new one
const RESUBSCRIBE_PAUSE: Duration = Duration::from_millis(500);

/// Opens connections to the Deriv API
#[derive(Debug, Clone)]
pub struct DerivConnector {
    url: url::Url,
}

impl DerivConnector {
    pub fn new(endpoint: &str, app_id: u32) -> Result<Self> {
        Ok(Self {
            url: protocol::endpoint_url(endpoint, app_id)?,
        })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }
}

#[async_trait]
impl Connector for DerivConnector {
    type Connection = DerivConnection;

    async fn connect(&self) -> Result<DerivConnection> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| FeedError::Connection(e.to_string()))?;

        info!("Connected to Deriv at {}", self.url);

        let (sink, reader) = ws_stream.split();
        Ok(DerivConnection { sink, reader })
    }
}

/// A live Deriv WebSocket, split into write and read halves
pub struct DerivConnection {
    sink: WsSink,
    reader: WsReader,
}

impl DerivConnection {
    async fn send_json(&mut self, request: Value) -> Result<()> {
        self.sink
            .send(Message::Text(request.to_string()))
            .await
            .map_err(|e| FeedError::Send(e.to_string()))
    }
}

#[async_trait]
impl Connection for DerivConnection {
    async fn subscribe(&mut self, symbol: &str) -> Result<()> {
        self.send_json(protocol::forget_all_ticks()).await?;
        tokio::time::sleep(RESUBSCRIBE_PAUSE).await;
        self.send_json(protocol::subscribe_ticks(symbol)).await?;
        info!("Subscribed to {} ticks", symbol);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<Inbound>> {
        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => return Some(protocol::parse_message(&text)),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.sink.send(Message::Pong(data)).await {
                        return Some(Err(FeedError::Disconnected(format!(
                            "Failed to send pong: {}",
                            e
                        ))));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Deriv closed the connection: {:?}", frame);
                    return None;
                }
                Some(Ok(other)) => debug!("Ignoring frame: {:?}", other),
                Some(Err(e)) => return Some(Err(FeedError::Disconnected(e.to_string()))),
                None => return None,
            }
        }
    }
}
