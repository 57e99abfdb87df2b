//! Signal Bot - live volatility index signals
//!
//! 1. Streams ticks for one Deriv index over WebSocket
//! 2. Runs each tick through the signal engine and rule filter
//! 3. Sends approved signals to Telegram / WhatsApp
//! 4. Journals every decision and serves a JSON control API

use std::sync::Arc;
use tracing::{info, warn};

use signal_bot::journal::{spawn_writer, Journal};
use signal_bot::{router, AppState, BotRunner, ClockSource, NotifierHub, Settings};
use signal_engine::BotSession;
use tick_feed::{spawn_feed, DerivConnector, FeedCommand};

const FEED_BUFFER: usize = 1024;
const JOURNAL_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_max_level(settings.tracing_level())
        .init();

    info!("Starting Signal Bot...");

    let mut session = BotSession::for_symbol(&settings.bot.symbol)?;
    let instrument = session.instrument().clone();
    info!(
        "Instrument: {} ({}), SL {} / TP {}",
        instrument.name,
        instrument.frequency(),
        instrument.stop_loss,
        instrument.take_profit
    );

    let journal = Journal::new(&settings.journal.dir);
    journal.init().await?;
    let (journal_handle, _writer) = spawn_writer(
        journal.clone(),
        JOURNAL_BUFFER,
        settings.journal.market_sample_every,
    );
    journal.clone().spawn_retention(settings.journal.retention_days);
    journal_handle.info(format!("Bot starting on {}", instrument.symbol));

    let notifiers = NotifierHub::from_settings(&settings)?;
    for status in notifiers.statuses() {
        if status.enabled && !status.configured {
            warn!("{} notifications enabled but not configured", status.channel);
        }
    }

    if settings.bot.auto_start {
        session.start();
    }

    let connector = DerivConnector::new(&settings.feed.endpoint, settings.feed.app_id)?;
    info!("Tick feed: {}", connector.url());
    let feed = spawn_feed(
        connector,
        settings.feed.reconnect_policy(),
        instrument.symbol.clone(),
        FEED_BUFFER,
    );
    let feed_commands = feed.commands.clone();

    let runner = BotRunner::new(
        session,
        notifiers,
        journal_handle,
        feed.commands,
        ClockSource::from_offset_minutes(settings.bot.utc_offset_minutes),
    );
    let (control, _runner) = runner.spawn(feed.events);

    let app = router(Arc::new(AppState { control, journal }));
    let listener = tokio::net::TcpListener::bind(settings.bind_addr()).await?;
    info!("🚀 Control API listening on {}", settings.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    let _ = feed_commands.send(FeedCommand::Shutdown).await;
    Ok(())
}
