//! Feed supervision: subscribe, forward ticks, reconnect with a bounded budget

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::Inbound;
use crate::types::{FeedCommand, FeedError, FeedEvent, Result};

/// Something that can open a tick connection
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection + 'static;

    async fn connect(&self) -> Result<Self::Connection>;
}

/// An open tick connection
#[async_trait]
pub trait Connection: Send {
    /// Replace any active subscription with `symbol`
    async fn subscribe(&mut self, symbol: &str) -> Result<()>;

    /// Next decoded message, `None` once the connection is closed
    async fn next_message(&mut self) -> Option<Result<Inbound>>;
}

/// Fixed-delay reconnection with a cap on consecutive failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

/// Channels to a running feed task
pub struct FeedHandle {
    pub events: mpsc::Receiver<FeedEvent>,
    pub commands: mpsc::Sender<FeedCommand>,
    pub task: JoinHandle<()>,
}

/// Spawn the feed task for `symbol`
pub fn spawn_feed<C: Connector>(
    connector: C,
    policy: ReconnectPolicy,
    symbol: impl Into<String>,
    buffer: usize,
) -> FeedHandle {
    let (event_tx, event_rx) = mpsc::channel(buffer);
    let (command_tx, command_rx) = mpsc::channel(16);
    let symbol = symbol.into();

    let task = tokio::spawn(async move {
        run_feed(connector, policy, symbol, event_tx, command_rx).await;
    });

    FeedHandle {
        events: event_rx,
        commands: command_tx,
        task,
    }
}

enum StreamEnd {
    Shutdown,
    Lost(String),
}

/// Drive connections until shutdown or until reconnects are exhausted
pub async fn run_feed<C: Connector>(
    connector: C,
    policy: ReconnectPolicy,
    mut symbol: String,
    events: mpsc::Sender<FeedEvent>,
    mut commands: mpsc::Receiver<FeedCommand>,
) {
    let mut failures: u32 = 0;

    loop {
        let reason = match connector.connect().await {
            Ok(mut conn) => {
                match stream_ticks(&mut conn, &mut symbol, &events, &mut commands, &mut failures).await {
                    StreamEnd::Shutdown => {
                        info!("Tick feed shutting down");
                        return;
                    }
                    StreamEnd::Lost(reason) => reason,
                }
            }
            Err(e) => e.to_string(),
        };

        failures += 1;
        if !policy.allows(failures) {
            error!(
                "Tick feed gave up after {} reconnect attempts: {}",
                policy.max_attempts, reason
            );
            let _ = events
                .send(FeedEvent::GaveUp {
                    attempts: policy.max_attempts,
                })
                .await;
            return;
        }

        warn!(
            "Tick feed disconnected ({}), reconnect {}/{} in {:?}",
            reason, failures, policy.max_attempts, policy.delay
        );
        if events
            .send(FeedEvent::Disconnected {
                attempt: failures,
                reason,
            })
            .await
            .is_err()
        {
            return;
        }

        // Commands during the back-off update the symbol but never cut the delay short
        let backoff = tokio::time::sleep(policy.delay);
        tokio::pin!(backoff);
        loop {
            tokio::select! {
                _ = &mut backoff => break,
                cmd = commands.recv() => match cmd {
                    Some(FeedCommand::Subscribe(next)) => {
                        debug!("Subscription to {} queued for reconnect", next);
                        symbol = next;
                    }
                    Some(FeedCommand::Shutdown) | None => return,
                }
            }
        }
    }
}

async fn stream_ticks<T: Connection>(
    conn: &mut T,
    symbol: &mut String,
    events: &mpsc::Sender<FeedEvent>,
    commands: &mut mpsc::Receiver<FeedCommand>,
    failures: &mut u32,
) -> StreamEnd {
    if let Err(e) = conn.subscribe(symbol).await {
        return StreamEnd::Lost(e.to_string());
    }
    *failures = 0;

    if events
        .send(FeedEvent::Connected {
            symbol: symbol.clone(),
        })
        .await
        .is_err()
    {
        return StreamEnd::Shutdown;
    }

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(FeedCommand::Subscribe(next)) => {
                    let result = conn.subscribe(&next).await;
                    *symbol = next;
                    if let Err(e) = result {
                        return StreamEnd::Lost(e.to_string());
                    }
                    if events.send(FeedEvent::Subscribed { symbol: symbol.clone() }).await.is_err() {
                        return StreamEnd::Shutdown;
                    }
                }
                Some(FeedCommand::Shutdown) | None => return StreamEnd::Shutdown,
            },
            msg = conn.next_message() => match msg {
                Some(Ok(Inbound::Tick(tick))) => {
                    if tick.symbol != *symbol {
                        debug!("Dropping tick for {} while subscribed to {}", tick.symbol, symbol);
                        continue;
                    }
                    if events.send(FeedEvent::Tick(tick)).await.is_err() {
                        return StreamEnd::Shutdown;
                    }
                }
                Some(Ok(Inbound::Other(kind))) => debug!("Ignoring {} message", kind),
                Some(Err(FeedError::Api { code, message })) => {
                    warn!("Deriv API error {}: {}", code, message);
                    if events.send(FeedEvent::ApiError { code, message }).await.is_err() {
                        return StreamEnd::Shutdown;
                    }
                }
                Some(Err(FeedError::InvalidMessage(e))) => warn!("Skipping invalid message: {}", e),
                Some(Err(e)) => return StreamEnd::Lost(e.to_string()),
                None => return StreamEnd::Lost("connection closed".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tick;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    enum Script {
        Fail,
        Serve { ticks: Vec<Tick>, hold_open: bool },
    }

    #[derive(Clone)]
    struct MockConnector {
        scripts: Arc<Mutex<VecDeque<Script>>>,
        connects: Arc<Mutex<u32>>,
    }

    impl MockConnector {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Arc::new(Mutex::new(scripts.into())),
                connects: Arc::new(Mutex::new(0)),
            }
        }

        fn connects(&self) -> u32 {
            *self.connects.lock().unwrap()
        }
    }

    struct MockConnection {
        ticks: VecDeque<Tick>,
        hold_open: bool,
        subscriptions: Vec<String>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Connection = MockConnection;

        async fn connect(&self) -> Result<MockConnection> {
            *self.connects.lock().unwrap() += 1;
            let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Fail);
            match script {
                Script::Fail => Err(FeedError::Connection("refused".to_string())),
                Script::Serve { ticks, hold_open } => Ok(MockConnection {
                    ticks: ticks.into(),
                    hold_open,
                    subscriptions: Vec::new(),
                }),
            }
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn subscribe(&mut self, symbol: &str) -> Result<()> {
            self.subscriptions.push(symbol.to_string());
            Ok(())
        }

        async fn next_message(&mut self) -> Option<Result<Inbound>> {
            match self.ticks.pop_front() {
                Some(tick) => Some(Ok(Inbound::Tick(tick))),
                None if self.hold_open => std::future::pending().await,
                None => None,
            }
        }
    }

    fn tick(symbol: &str, quote: f64) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            quote,
            bid: None,
            ask: None,
            epoch: 1_709_632_800,
        }
    }

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_millis(5),
            max_attempts: 5,
        }
    }

    async fn collect(handle: &mut FeedHandle) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        while let Some(event) = handle.events.recv().await {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let connector = MockConnector::new(vec![]);
        let mut handle = spawn_feed(connector.clone(), fast_policy(), "1HZ75V", 64);

        let events = collect(&mut handle).await;
        let disconnects: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                FeedEvent::Disconnected { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();

        assert_eq!(disconnects, vec![1, 2, 3, 4, 5]);
        assert_eq!(events.last(), Some(&FeedEvent::GaveUp { attempts: 5 }));
        // Initial attempt plus five reconnects
        assert_eq!(connector.connects(), 6);
    }

    #[tokio::test]
    async fn test_forwards_ticks_and_resets_budget() {
        let connector = MockConnector::new(vec![
            Script::Serve {
                ticks: vec![tick("1HZ75V", 100.0), tick("R_10", 5.0), tick("1HZ75V", 101.0)],
                hold_open: false,
            },
            Script::Fail,
            Script::Serve {
                ticks: vec![tick("1HZ75V", 102.0)],
                hold_open: false,
            },
        ]);
        let mut handle = spawn_feed(connector, fast_policy(), "1HZ75V", 64);
        let events = collect(&mut handle).await;

        let quotes: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                FeedEvent::Tick(t) => Some(t.quote),
                _ => None,
            })
            .collect();
        assert_eq!(quotes, vec![100.0, 101.0, 102.0]);
        assert_eq!(events[0], FeedEvent::Connected { symbol: "1HZ75V".to_string() });

        // Lost, refused, then a successful connection resets the counter
        let attempts: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                FeedEvent::Disconnected { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(&attempts[..3], &[1, 2, 1]);
    }

    #[tokio::test]
    async fn test_resubscribe_and_shutdown() {
        let connector = MockConnector::new(vec![Script::Serve {
            ticks: vec![],
            hold_open: true,
        }]);
        let mut handle = spawn_feed(connector, fast_policy(), "1HZ75V", 64);

        assert_eq!(
            handle.events.recv().await,
            Some(FeedEvent::Connected { symbol: "1HZ75V".to_string() })
        );

        handle.commands.send(FeedCommand::Subscribe("R_50".to_string())).await.unwrap();
        assert_eq!(
            handle.events.recv().await,
            Some(FeedEvent::Subscribed { symbol: "R_50".to_string() })
        );

        handle.commands.send(FeedCommand::Shutdown).await.unwrap();
        assert_eq!(handle.events.recv().await, None);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_during_backoff_keeps_delay() {
        let connector = MockConnector::new(vec![
            Script::Fail,
            Script::Serve {
                ticks: vec![],
                hold_open: true,
            },
        ]);
        let policy = ReconnectPolicy {
            delay: Duration::from_millis(150),
            max_attempts: 5,
        };
        let mut handle = spawn_feed(connector.clone(), policy, "1HZ75V", 64);

        assert!(matches!(
            handle.events.recv().await,
            Some(FeedEvent::Disconnected { attempt: 1, .. })
        ));
        let lost_at = tokio::time::Instant::now();
        handle.commands.send(FeedCommand::Subscribe("R_50".to_string())).await.unwrap();

        assert_eq!(
            handle.events.recv().await,
            Some(FeedEvent::Connected { symbol: "R_50".to_string() })
        );
        assert!(lost_at.elapsed() >= Duration::from_millis(100));
        assert_eq!(connector.connects(), 2);

        handle.commands.send(FeedCommand::Shutdown).await.unwrap();
        handle.task.await.unwrap();
    }

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay, Duration::from_secs(3));
        assert!(policy.allows(5));
        assert!(!policy.allows(6));
    }
}
