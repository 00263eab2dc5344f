use std::time::Duration;

/// Decides whether the user is away based on how long they have been idle.
#[derive(Debug, Clone, Copy)]
pub struct AfkEvaluator {
    threshold: Duration,
}

impl AfkEvaluator {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn is_afk(&self, idle_time: Duration) -> bool {
        self.threshold <= idle_time
    }
}
