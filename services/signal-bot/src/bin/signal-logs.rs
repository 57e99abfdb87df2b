//! Signal Logs - inspect and maintain the decision journal.
//!
//! Commands:
//! - `view` - newest entries of one log type for a day
//! - `summary` - per-day counts and approval rate
//! - `clean` - delete journal files older than the retention window
//! - `export` - write recent signal decisions to CSV

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use signal_bot::journal::{ActivityEntry, ErrorEntry, Journal, LogKind, SignalEntry};
use signal_bot::Settings;

#[derive(Parser)]
#[command(name = "signal-logs", about = "Signal Bot journal viewer and cleaner")]
struct Cli {
    /// Journal directory. Defaults to the bot's configured directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the newest entries of one log type.
    View {
        /// signals, activity, market or errors.
        #[arg(default_value = "signals")]
        kind: LogKind,

        /// Day to show (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Maximum entries to show.
        #[arg(long, default_value_t = 20)]
        lines: usize,
    },
    /// Count entries for one day.
    Summary {
        /// Day to summarize (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete journal files not modified within the retention window.
    Clean {
        /// Retention window in days.
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// Only list what would be deleted.
        #[arg(short = 'n', long, default_value_t = false)]
        dry_run: bool,
    },
    /// Export signal decisions from the last N days to CSV.
    Export {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let cli = Cli::parse();
    let dir = match cli.dir {
        Some(dir) => dir,
        None => Settings::load()?.journal.dir,
    };
    let journal = Journal::new(dir);
    let today = Utc::now().date_naive();

    match cli.command {
        Commands::View { kind, date, lines } => run_view(&journal, kind, date.unwrap_or(today), lines).await,
        Commands::Summary { date } => run_summary(&journal, date.unwrap_or(today)).await,
        Commands::Clean { days, dry_run } => run_clean(&journal, days, dry_run).await,
        Commands::Export { days } => run_export(&journal, days, today).await,
    }
}

async fn run_view(journal: &Journal, kind: LogKind, date: NaiveDate, lines: usize) -> Result<()> {
    let path = journal.path_for(kind, date);
    if !path.exists() {
        println!("No {kind} log for {date} ({})", path.display());
        return Ok(());
    }

    match kind {
        LogKind::Signals => {
            let mut entries: Vec<SignalEntry> = journal.read(kind, date).await?;
            let total = entries.len();
            entries.reverse();
            entries.truncate(lines);

            println!("Showing {} of {} signal decisions for {date}", entries.len(), total);
            println!();
            for e in &entries {
                print_signal(e);
            }

            let approved = entries.iter().filter(|e| e.approved).count();
            if !entries.is_empty() {
                println!(
                    "Filter: {} approved, {} rejected ({:.1}% approval rate)",
                    approved,
                    entries.len() - approved,
                    approved as f64 / entries.len() as f64 * 100.0
                );
            }
        }
        LogKind::Activity => {
            let mut entries: Vec<ActivityEntry> = journal.read(kind, date).await?;
            entries.reverse();
            for e in entries.iter().take(lines) {
                println!(
                    "{} [{:?}] {}",
                    e.timestamp.format("%H:%M:%S"),
                    e.level,
                    e.message
                );
            }
        }
        LogKind::Errors => {
            let mut entries: Vec<ErrorEntry> = journal.read(kind, date).await?;
            entries.reverse();
            for e in entries.iter().take(lines) {
                println!("{} {}: {}", e.timestamp.format("%H:%M:%S"), e.context, e.error);
            }
        }
        LogKind::Market => {
            let mut entries = journal.read_values(kind, date).await?;
            entries.reverse();
            for e in entries.iter().take(lines) {
                println!("{}", serde_json::to_string_pretty(e)?);
            }
        }
    }
    Ok(())
}

fn print_signal(e: &SignalEntry) {
    let verdict = if e.approved { "APPROVED" } else { "REJECTED" };
    println!(
        "{} {:<8} {} {} @ {}  SL {}  TP {}",
        e.timestamp.format("%H:%M:%S"),
        verdict,
        e.direction,
        e.symbol,
        e.entry_price,
        e.stop_loss,
        e.take_profit
    );
    println!(
        "         confidence {} -> {}  RSI {:.1}  vol {:.2}%  {} / {}",
        e.confidence,
        e.filter_confidence,
        e.technicals.rsi,
        e.technicals.volatility,
        e.technicals.trend.as_str(),
        e.technicals.momentum.as_str()
    );
    println!("         {}", e.reason);
    println!();
}

async fn run_summary(journal: &Journal, date: NaiveDate) -> Result<()> {
    let summary = journal.summary(date).await?;
    println!("=== Journal Summary {} ===", summary.date);
    println!(
        "Signals:   {} ({} approved, {} rejected, {} approval)",
        summary.signals.total,
        summary.signals.approved,
        summary.signals.rejected,
        summary.signals.approval_rate
    );
    println!("Activity:  {}", summary.activity);
    println!("Market:    {}", summary.market);
    println!("Errors:    {}", summary.errors);
    Ok(())
}

async fn run_clean(journal: &Journal, days: u32, dry_run: bool) -> Result<()> {
    if !journal.dir().exists() {
        println!("Journal directory does not exist: {}", journal.dir().display());
        return Ok(());
    }

    let report = journal.cleanup(days, dry_run).await?;
    println!("Journal: {}", journal.dir().display());
    println!("Retention: {days} days");
    println!("Log files: {}", report.scanned);

    if report.removed.is_empty() {
        println!("No files older than {days} days.");
        return Ok(());
    }

    println!(
        "{} {} file(s), {}:",
        if dry_run { "Would delete" } else { "Deleted" },
        report.removed.len(),
        format_size(report.bytes)
    );
    for file in &report.removed {
        println!("  {} ({}, {} days old)", file.name, format_size(file.size), file.age_days);
    }
    if dry_run {
        println!();
        println!("Dry run - run without --dry-run to delete.");
    }
    Ok(())
}

async fn run_export(journal: &Journal, days: u32, today: NaiveDate) -> Result<()> {
    journal.init().await?;
    let (path, rows) = journal.export_signals_csv(days, today).await?;
    println!("Exported {rows} signal decision(s) to {}", path.display());
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
