//! Timers that deliver their firings into the companion event queue.
//!
//! A timer never calls into an engine directly. Each firing becomes an [Event::Timer] carrying the
//! [TimerId] of the handle that armed it, and engines drop events whose id is not the handle they
//! currently hold. Together with cancellation this means a cancelled handle is never observed,
//! even if its last firing was already queued.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::trace;

use crate::{companion::event::Event, utils::clock::Clock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// What a timer is for. Used by the companion to route a firing to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    MoodRevert,
    MoodIdle,
    DayNight,
    SessionTick,
}

/// Armed timer. Dropping the handle cancels the timer.
pub struct TimerHandle {
    id: TimerId,
    guard: DropGuard,
}

impl TimerHandle {
    pub fn new(id: TimerId, token: CancellationToken) -> Self {
        Self {
            id,
            guard: token.drop_guard(),
        }
    }

    pub fn is(&self, id: TimerId) -> bool {
        self.id == id
    }

    pub fn cancel(self) {
        self.guard.disarm().cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TimerHandle").field(&self.id).finish()
    }
}

pub trait Scheduler: Send + Sync {
    fn schedule_once(&self, delay: Duration, kind: TimerKind) -> TimerHandle;

    fn schedule_repeating(&self, interval: Duration, kind: TimerKind) -> TimerHandle;
}

#[derive(Default)]
pub struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// [Scheduler] backed by tokio tasks. Must be used from within a runtime.
pub struct TokioScheduler {
    sender: mpsc::UnboundedSender<Event>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
}

impl TokioScheduler {
    pub fn new(sender: mpsc::UnboundedSender<Event>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sender,
            clock,
            ids: IdGenerator::default(),
        }
    }

    fn spawn_timer(
        &self,
        first: Duration,
        period: Option<Duration>,
        kind: TimerKind,
    ) -> TimerHandle {
        let id = TimerId(self.ids.next());
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let sender = self.sender.clone();
        let clock = self.clock.clone();
        let mut deadline = clock.instant() + first;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => return,
                    _ = clock.sleep_until(deadline) => ()
                }
                trace!("Timer {id:?} ({kind:?}) fired");
                if sender.send(Event::Timer { id, kind }).is_err() {
                    // Receiver is gone, the companion has shut down.
                    return;
                }
                match period {
                    Some(period) => deadline += period,
                    None => return,
                }
            }
        });

        TimerHandle::new(id, token)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, kind: TimerKind) -> TimerHandle {
        self.spawn_timer(delay, None, kind)
    }

    fn schedule_repeating(&self, interval: Duration, kind: TimerKind) -> TimerHandle {
        self.spawn_timer(interval, Some(interval), kind)
    }
}
