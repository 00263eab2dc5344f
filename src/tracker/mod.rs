//! Work session tracking. [session::WorkSessionTracker] turns start/stop/preset commands plus
//! ticks and activity notifications into durations stored in a
//! [HistoryStore](crate::storage::history_store::HistoryStore).

pub mod afk;
pub mod session;

use std::{fmt::Display, time::Duration};

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Tracking,
    Paused,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Tracking => write!(f, "tracking"),
            SessionState::Paused => write!(f, "paused"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Period of the session tick. Every tick while tracking adds exactly this much time.
    pub tick_interval: Duration,
    /// Inactivity after which a tracking session is paused.
    pub idle_threshold: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}
