//! The companion is the single place where mood and session state change. Everything else, UI
//! commands, timer firings and activity notifications, is turned into an [Event] and queued for
//! [Companion::run].

pub mod event;
pub mod shutdown;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use event::{Command, Event, Notifier};
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::{
    activity::ActivityMonitor,
    mood::{ambient::CpuLevel, controller::MoodController, MoodConfig},
    schedule::{TimerKind, TokioScheduler},
    storage::history_store::HistoryStore,
    tracker::{session::WorkSessionTracker, TrackerConfig},
    utils::{clock::Clock, percentage::Percentage},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct CompanionConfig {
    pub mood: MoodConfig,
    pub tracker: TrackerConfig,
}

pub struct Companion<S> {
    events: mpsc::UnboundedReceiver<Event>,
    mood: MoodController,
    tracker: WorkSessionTracker<S>,
    shutdown: CancellationToken,
}

impl<S: HistoryStore> Companion<S> {
    pub fn new(
        events: mpsc::UnboundedReceiver<Event>,
        mood: MoodController,
        tracker: WorkSessionTracker<S>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            events,
            mood,
            tracker,
            shutdown,
        }
    }

    pub fn mood(&self) -> &MoodController {
        &self.mood
    }

    pub fn tracker(&self) -> &WorkSessionTracker<S> {
        &self.tracker
    }

    /// Drains the event queue until shutdown is requested. Events already queued at that point are
    /// still applied, then a running session is stopped so its time gets stored.
    pub async fn run(&mut self) {
        self.mood.start();
        info!("Companion started");
        loop {
            select! {
                biased;
                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
                _ = self.shutdown.cancelled() => break,
            }
        }
        self.tracker.stop().await;
        self.mood.stop();
        info!("Companion stopped");
    }

    async fn dispatch(&mut self, event: Event) {
        trace!("Dispatching {event:?}");
        match event {
            Event::Timer {
                id,
                kind: TimerKind::SessionTick,
            } => self.tracker.handle_timer(id).await,
            Event::Timer { id, kind } => self.mood.handle_timer(id, kind),
            Event::Activity { subscription } => {
                self.mood.handle_activity(subscription);
                self.tracker.handle_activity(subscription);
            }
            Event::Command(command) => self.execute(command).await,
        }
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::Click => self.mood.click(),
            Command::DragStarted => self.mood.drag_started(),
            Command::DragEnded => self.mood.drag_ended(),
            Command::SetCpuLevel(level) => self.mood.set_cpu_level(level),
            Command::StartTracking => self.tracker.start(),
            Command::StopTracking => self.tracker.stop().await,
            Command::SwitchPreset(preset) => self.tracker.switch_preset(preset).await,
            Command::ClearPreset => self.tracker.clear_preset().await,
            Command::TodayTotal(reply) => {
                let total = self.tracker.today_total().await;
                if reply.send(total).is_err() {
                    debug!("Nobody is waiting for today's total anymore");
                }
            }
        }
    }
}

/// Cloneable entry point for the UI layer. Every call only queues a command.
#[derive(Debug, Clone)]
pub struct CompanionHandle {
    sender: mpsc::UnboundedSender<Event>,
}

impl CompanionHandle {
    pub fn new(sender: mpsc::UnboundedSender<Event>) -> Self {
        Self { sender }
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(Event::Command(command))
            .map_err(|_| anyhow!("Companion is not running"))
    }

    pub fn click(&self) -> Result<()> {
        self.send(Command::Click)
    }

    pub fn drag_started(&self) -> Result<()> {
        self.send(Command::DragStarted)
    }

    pub fn drag_ended(&self) -> Result<()> {
        self.send(Command::DragEnded)
    }

    pub fn set_cpu_usage(&self, usage: Percentage) -> Result<()> {
        self.send(Command::SetCpuLevel(CpuLevel::from_usage(usage)))
    }

    pub fn start_tracking(&self) -> Result<()> {
        self.send(Command::StartTracking)
    }

    pub fn stop_tracking(&self) -> Result<()> {
        self.send(Command::StopTracking)
    }

    pub fn switch_preset(&self, preset: impl Into<String>) -> Result<()> {
        self.send(Command::SwitchPreset(preset.into()))
    }

    pub fn clear_preset(&self) -> Result<()> {
        self.send(Command::ClearPreset)
    }

    /// Stored time for today plus the running session.
    pub async fn today_total(&self) -> Result<f64> {
        let (reply, receiver) = oneshot::channel();
        self.send(Command::TodayTotal(reply))?;
        Ok(receiver.await?)
    }
}

/// Wires both engines to a shared event queue. `sender` must be the sending side of `events`, and
/// `activity` must deliver into it as well.
pub fn create_companion<S: HistoryStore>(
    (sender, events): (mpsc::UnboundedSender<Event>, mpsc::UnboundedReceiver<Event>),
    store: S,
    activity: Arc<dyn ActivityMonitor>,
    clock: Arc<dyn Clock>,
    config: CompanionConfig,
    notifier: Notifier,
    shutdown: CancellationToken,
) -> (Companion<S>, CompanionHandle) {
    let scheduler = Arc::new(TokioScheduler::new(sender.clone(), clock.clone()));
    let mood = MoodController::new(
        clock.clone(),
        scheduler.clone(),
        activity.clone(),
        config.mood,
        notifier.clone(),
    );
    let tracker = WorkSessionTracker::new(
        store,
        clock,
        scheduler,
        activity,
        config.tracker,
        notifier,
    );
    (
        Companion::new(events, mood, tracker, shutdown),
        CompanionHandle::new(sender),
    )
}
