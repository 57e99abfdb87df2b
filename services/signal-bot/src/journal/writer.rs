//! Background journal writer
//!
//! The runner never awaits disk I/O: entries go onto a bounded channel and a
//! single task appends them in order. A full queue drops the entry.

use chrono::{DateTime, Utc};
use signal_engine::{CandidateSignal, FilterVerdict, MarketQuote};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use super::entry::{ActivityEntry, ActivityLevel, ErrorEntry, LogKind, MarketEntry, SignalEntry};
use super::Journal;

#[derive(Debug)]
enum Record {
    Signal(SignalEntry),
    Activity(ActivityEntry),
    Market(MarketEntry),
    Error(ErrorEntry),
}

impl Record {
    fn kind(&self) -> LogKind {
        match self {
            Record::Signal(_) => LogKind::Signals,
            Record::Activity(_) => LogKind::Activity,
            Record::Market(_) => LogKind::Market,
            Record::Error(_) => LogKind::Errors,
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Record::Signal(e) => e.timestamp,
            Record::Activity(e) => e.timestamp,
            Record::Market(e) => e.timestamp,
            Record::Error(e) => e.timestamp,
        }
    }
}

/// Cheap, cloneable front end to the writer task
#[derive(Clone)]
pub struct JournalHandle {
    tx: mpsc::Sender<Record>,
    market_every: u64,
    ticks: Arc<AtomicU64>,
}

impl JournalHandle {
    pub fn record_decision(&self, signal: &CandidateSignal, verdict: &FilterVerdict) {
        let at = signal.evaluated_at.unwrap_or_else(Utc::now);
        self.enqueue(Record::Signal(SignalEntry::from_decision(signal, verdict, at)));
    }

    pub fn activity(&self, level: ActivityLevel, message: impl Into<String>) {
        self.enqueue(Record::Activity(ActivityEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.activity(ActivityLevel::Info, message);
    }

    pub fn error(&self, context: &str, err: &dyn Display) {
        self.enqueue(Record::Error(ErrorEntry {
            timestamp: Utc::now(),
            error: err.to_string(),
            context: context.to_string(),
        }));
    }

    /// Count a tick and log it if it falls on the sampling interval
    pub fn market_tick(&self, symbol: &str, quote: &MarketQuote, at: DateTime<Utc>) {
        if self.market_every == 0 {
            return;
        }
        let n = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.market_every == 0 {
            self.enqueue(Record::Market(MarketEntry::from_quote(symbol, quote, at)));
        }
    }

    fn enqueue(&self, record: Record) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(kind = %record.kind(), "Journal queue full, dropping entry");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Journal writer has stopped");
            }
        }
    }
}

/// Start the writer task; it exits once every handle is dropped
pub fn spawn_writer(journal: Journal, buffer: usize, market_every: u64) -> (JournalHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Record>(buffer);

    let task = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            let kind = record.kind();
            let at = record.timestamp();
            let result = match &record {
                Record::Signal(e) => journal.append(kind, at, e).await,
                Record::Activity(e) => journal.append(kind, at, e).await,
                Record::Market(e) => journal.append(kind, at, e).await,
                Record::Error(e) => journal.append(kind, at, e).await,
            };
            if let Err(e) = result {
                error!(kind = %kind, "Error writing journal entry: {:#}", e);
            }
        }
    });

    let handle = JournalHandle {
        tx,
        market_every,
        ticks: Arc::new(AtomicU64::new(0)),
    };
    (handle, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writer_appends_in_order() {
        let tmp = TempDir::new().unwrap();
        let journal = Journal::new(tmp.path());
        let (handle, task) = spawn_writer(journal.clone(), 64, 3);

        handle.info("Bot started");
        handle.activity(ActivityLevel::Warn, "Feed reconnecting");
        handle.error("feed", &"connection reset");
        let now = Utc::now();
        for i in 0..10 {
            handle.market_tick("1HZ75V", &MarketQuote::new(1000.0 + i as f64), now);
        }

        drop(handle);
        task.await.unwrap();

        let today = now.date_naive();
        let activity: Vec<ActivityEntry> = journal.read(LogKind::Activity, today).await.unwrap();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].message, "Bot started");
        assert_eq!(activity[1].level, ActivityLevel::Warn);

        let errors: Vec<ErrorEntry> = journal.read(LogKind::Errors, today).await.unwrap();
        assert_eq!(errors[0].error, "connection reset");
        assert_eq!(errors[0].context, "feed");

        let market: Vec<MarketEntry> = journal.read(LogKind::Market, today).await.unwrap();
        let prices: Vec<f64> = market.iter().map(|m| m.price).collect();
        assert_eq!(prices, vec![1002.0, 1005.0, 1008.0]);
    }

    #[tokio::test]
    async fn test_market_sampling_disabled() {
        let tmp = TempDir::new().unwrap();
        let journal = Journal::new(tmp.path());
        let (handle, task) = spawn_writer(journal.clone(), 8, 0);
        let now = Utc::now();
        for _ in 0..20 {
            handle.market_tick("R_50", &MarketQuote::new(250.0), now);
        }
        drop(handle);
        task.await.unwrap();
        assert!(journal.read_values(LogKind::Market, now.date_naive()).await.unwrap().is_empty());
    }
}
