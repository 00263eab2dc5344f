//! The character's mood. [state::MoodStateMachine] is the pure transition table,
//! [controller::MoodController] adds the timers and ambient signals that feed it.

pub mod ambient;
pub mod controller;
pub mod state;

use std::time::Duration;

const DEFAULT_REVERT_AFTER: Duration = Duration::from_secs(3);
const DEFAULT_IDLE_AFTER: Duration = Duration::from_secs(30 * 60);
const DEFAULT_DAY_NIGHT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct MoodConfig {
    /// How long a click or drag reaction stays before expiring into the base mood.
    pub revert_after: Duration,
    /// Time without interaction or activity before an idle character gets bored.
    pub idle_after: Duration,
    pub day_night_interval: Duration,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            revert_after: DEFAULT_REVERT_AFTER,
            idle_after: DEFAULT_IDLE_AFTER,
            day_night_interval: DEFAULT_DAY_NIGHT_INTERVAL,
        }
    }
}
