use std::fmt::Display;

use tracing::debug;

/// What the character is currently displaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mood {
    #[default]
    Idle,
    Happy,
    Sleeping,
    Surprised,
    Bored,
}

impl Mood {
    /// Moods that give way to the base mood when it changes.
    pub fn is_base_like(self) -> bool {
        matches!(self, Mood::Idle | Mood::Happy | Mood::Surprised | Mood::Bored)
    }
}

impl Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mood::Idle => write!(f, "idle"),
            Mood::Happy => write!(f, "happy"),
            Mood::Sleeping => write!(f, "sleeping"),
            Mood::Surprised => write!(f, "surprised"),
            Mood::Bored => write!(f, "bored"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodEvent {
    Clicked,
    DragStarted,
    NightTime,
    DayTime,
    IdleTimeout,
    TemporaryStateExpired,
}

/// Deterministic reducer from events to moods. It has no timers of its own, see
/// [MoodController](super::controller::MoodController) for those.
#[derive(Debug, Default)]
pub struct MoodStateMachine {
    current: Mood,
    base: Mood,
}

impl MoodStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Mood {
        self.current
    }

    pub fn base(&self) -> Mood {
        self.base
    }

    /// Applies an event. Returns the new mood only when it actually changed.
    pub fn handle_event(&mut self, event: MoodEvent) -> Option<Mood> {
        let next = self.next_state(event);
        self.transition(next, event)
    }

    /// Sets the mood temporary reactions settle on. A base-like mood converges to the new base
    /// right away, as if its temporary state had expired.
    pub fn set_base_state(&mut self, base: Mood) -> Option<Mood> {
        if self.base == base {
            return None;
        }
        self.base = base;
        if self.current.is_base_like() {
            self.transition(base, MoodEvent::TemporaryStateExpired)
        } else {
            None
        }
    }

    fn transition(&mut self, next: Mood, event: MoodEvent) -> Option<Mood> {
        if next == self.current {
            return None;
        }
        debug!("Mood {} -> {next} on {event:?}", self.current);
        self.current = next;
        Some(next)
    }

    fn next_state(&self, event: MoodEvent) -> Mood {
        match (self.current, event) {
            // Only daylight wakes the character up.
            (Mood::Sleeping, MoodEvent::DayTime) => Mood::Idle,
            (Mood::Sleeping, _) => Mood::Sleeping,

            (_, MoodEvent::NightTime) => Mood::Sleeping,
            (_, MoodEvent::Clicked) => Mood::Happy,
            (_, MoodEvent::DragStarted) => Mood::Surprised,
            (Mood::Idle, MoodEvent::IdleTimeout) => Mood::Bored,

            (Mood::Happy | Mood::Surprised | Mood::Bored, MoodEvent::TemporaryStateExpired) => {
                self.base
            }

            (current, _) => current,
        }
    }
}
