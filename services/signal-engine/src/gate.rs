//! Emission cooldown

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::instrument::Cadence;

/// True when no signal has been emitted yet or the cadence interval has elapsed
pub fn allow(last_emitted_at: Option<DateTime<Utc>>, now: DateTime<Utc>, cadence: Cadence) -> bool {
    match last_emitted_at {
        None => true,
        Some(last) => now - last >= cadence.min_interval(),
    }
}

/// Tracks the last approved emission
///
/// Only [`SignalGate::record`] writes the timestamp, and callers invoke it
/// once per approved signal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignalGate {
    last_emitted_at: Option<DateTime<Utc>>,
}

impl SignalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&self, now: DateTime<Utc>, cadence: Cadence) -> bool {
        allow(self.last_emitted_at, now, cadence)
    }

    pub fn record(&mut self, now: DateTime<Utc>) {
        self.last_emitted_at = Some(now);
    }

    pub fn last_emitted_at(&self) -> Option<DateTime<Utc>> {
        self.last_emitted_at
    }

    /// Time left until the gate reopens, zero when open
    pub fn remaining(&self, now: DateTime<Utc>, cadence: Cadence) -> Duration {
        match self.last_emitted_at {
            None => Duration::zero(),
            Some(last) => (cadence.min_interval() - (now - last)).max(Duration::zero()),
        }
    }
}
