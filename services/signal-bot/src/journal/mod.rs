//! Decision journal - daily JSON-lines files for auditing the bot
//!
//! Layout: `{dir}/{kind}_{YYYY-MM-DD}.jsonl`, one JSON object per line, dated
//! in UTC. Unreadable lines are skipped on read.

pub mod entry;
pub mod writer;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub use entry::{ActivityEntry, ActivityLevel, ErrorEntry, LogKind, MarketEntry, SignalEntry};
pub use writer::{spawn_writer, JournalHandle};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// File extensions the cleaner is allowed to remove
const MANAGED_EXTENSIONS: &[&str] = &["jsonl", "log", "csv"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalCounts {
    pub total: usize,
    pub approved: usize,
    pub rejected: usize,
    pub approval_rate: String,
}

/// Per-day line counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogSummary {
    pub date: NaiveDate,
    pub signals: SignalCounts,
    pub activity: usize,
    pub market: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedFile {
    pub name: String,
    pub size: u64,
    pub age_days: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub removed: Vec<RemovedFile>,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create journal dir {}", self.dir.display()))?;
        Ok(())
    }

    pub fn path_for(&self, kind: LogKind, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.jsonl", kind.prefix(), date.format("%Y-%m-%d")))
    }

    /// Append one line to the file for the entry's day
    pub async fn append<T: Serialize>(
        &self,
        kind: LogKind,
        at: DateTime<Utc>,
        entry: &T,
    ) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let path = self.path_for(kind, at.date_naive());
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Raw lines for one day, oldest first; a missing file reads as empty
    pub async fn read_values(
        &self,
        kind: LogKind,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        self.read(kind, date).await
    }

    pub async fn read<T: DeserializeOwned>(
        &self,
        kind: LogKind,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<T>> {
        let path = self.path_for(kind, date);
        let data = match fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        let mut entries = Vec::new();
        for (n, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(file = %path.display(), line = n + 1, "Skipping bad journal line: {}", e),
            }
        }
        Ok(entries)
    }

    /// Newest entries from `today`, topped up from the day before
    pub async fn recent(
        &self,
        kind: LogKind,
        limit: usize,
        today: NaiveDate,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut entries = self.read_values(kind, today).await?;
        if entries.len() < limit {
            if let Some(yesterday) = today.pred_opt() {
                entries.extend(self.read_values(kind, yesterday).await?);
            }
        }

        entries.sort_by_key(|e| std::cmp::Reverse(entry_time(e)));
        entries.truncate(limit);
        Ok(entries)
    }

    pub async fn summary(&self, date: NaiveDate) -> anyhow::Result<LogSummary> {
        let signals: Vec<serde_json::Value> = self.read(LogKind::Signals, date).await?;
        let approved = signals
            .iter()
            .filter(|s| s.get("approved").and_then(|a| a.as_bool()).unwrap_or(false))
            .count();
        let total = signals.len();

        Ok(LogSummary {
            date,
            signals: SignalCounts {
                total,
                approved,
                rejected: total - approved,
                approval_rate: percent(approved, total),
            },
            activity: self.read_values(LogKind::Activity, date).await?.len(),
            market: self.read_values(LogKind::Market, date).await?.len(),
            errors: self.read_values(LogKind::Errors, date).await?.len(),
        })
    }

    /// Remove journal files not modified in `retention_days`
    pub async fn cleanup(&self, retention_days: u32, dry_run: bool) -> anyhow::Result<CleanupReport> {
        let cutoff = SystemTime::now()
            .checked_sub(std::time::Duration::from_secs(retention_days as u64 * SECS_PER_DAY))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.cleanup_before(cutoff, dry_run).await
    }

    pub async fn cleanup_before(&self, cutoff: SystemTime, dry_run: bool) -> anyhow::Result<CleanupReport> {
        let mut report = CleanupReport {
            dry_run,
            scanned: 0,
            removed: Vec::new(),
            bytes: 0,
        };

        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let metadata = item.metadata().await?;
            if !metadata.is_file() || !is_managed(&path) {
                continue;
            }
            report.scanned += 1;

            let modified = metadata.modified()?;
            if modified >= cutoff {
                continue;
            }

            let name = item.file_name().to_string_lossy().into_owned();
            if !dry_run {
                fs::remove_file(&path).await?;
                info!(file = %name, "Deleted old log file");
            }
            let age_days = now
                .duration_since(modified)
                .map(|d| d.as_secs() / SECS_PER_DAY)
                .unwrap_or(0);
            report.bytes += metadata.len();
            report.removed.push(RemovedFile {
                name,
                size: metadata.len(),
                age_days,
            });
        }

        report.removed.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(removed = report.removed.len(), dry_run, "Journal cleanup finished");
        Ok(report)
    }

    /// Run cleanup now and then once a day
    pub fn spawn_retention(self, retention_days: u32) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut daily = tokio::time::interval(std::time::Duration::from_secs(SECS_PER_DAY));
            loop {
                daily.tick().await;
                match self.cleanup(retention_days, false).await {
                    Ok(report) if !report.removed.is_empty() => {
                        info!(
                            files = report.removed.len(),
                            bytes = report.bytes,
                            "Removed journal files older than {} days",
                            retention_days
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Journal cleanup failed: {:#}", e),
                }
            }
        })
    }

    /// Signal entries from the last `days` days as CSV, oldest first
    pub async fn signals_csv(&self, days: u32, today: NaiveDate) -> anyhow::Result<(String, usize)> {
        let mut entries: Vec<SignalEntry> = Vec::new();
        for back in (0..days.max(1) as i64).rev() {
            let date = today - Duration::days(back);
            entries.extend(self.read(LogKind::Signals, date).await?);
        }

        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record([
            "timestamp",
            "signal_id",
            "symbol",
            "direction",
            "entry_price",
            "stop_loss",
            "take_profit",
            "confidence",
            "filter_confidence",
            "approved",
            "reason",
            "rsi",
            "volatility",
            "trend",
            "momentum",
        ])?;
        for e in &entries {
            wtr.write_record([
                e.timestamp.to_rfc3339(),
                e.signal_id.to_string(),
                e.symbol.clone(),
                e.direction.to_string(),
                e.entry_price.to_string(),
                e.stop_loss.to_string(),
                e.take_profit.to_string(),
                e.confidence.to_string(),
                e.filter_confidence.to_string(),
                e.approved.to_string(),
                e.reason.clone(),
                format!("{:.2}", e.technicals.rsi),
                format!("{:.4}", e.technicals.volatility),
                e.technicals.trend.as_str().to_string(),
                e.technicals.momentum.as_str().to_string(),
            ])?;
        }
        let data = wtr.into_inner().context("failed to flush CSV writer")?;
        let csv = String::from_utf8(data).context("CSV output is not valid UTF-8")?;
        Ok((csv, entries.len()))
    }

    /// Write `signals_export_{today}.csv` into the journal dir
    pub async fn export_signals_csv(&self, days: u32, today: NaiveDate) -> anyhow::Result<(PathBuf, usize)> {
        let (csv, rows) = self.signals_csv(days, today).await?;
        let path = self
            .dir
            .join(format!("signals_export_{}.csv", today.format("%Y-%m-%d")));
        fs::write(&path, csv)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok((path, rows))
    }
}

fn entry_time(entry: &serde_json::Value) -> Option<DateTime<Utc>> {
    entry
        .get("timestamp")
        .and_then(|t| t.as_str())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn is_managed(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MANAGED_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

fn percent(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", part as f64 / whole as f64 * 100.0)
}
