//! Signal Bot
//!
//! Service glue around the signal engine: configuration, tick feed wiring,
//! the bot runner, notification channels, the decision journal and the HTTP
//! control surface.

pub mod config;
pub mod control;
pub mod journal;
pub mod notify;
pub mod runner;

pub use config::Settings;
pub use control::{router, AppState};
pub use journal::{Journal, JournalHandle, LogKind};
pub use notify::{Notifier, NotifierHub, NotifyError};
pub use runner::{BotRunner, BotStatus, ClockSource, ControlError, ControlHandle, FeedStatus};
