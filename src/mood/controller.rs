use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::{
    activity::{ActivityMonitor, Subscription, SubscriptionId},
    companion::event::{Notification, Notifier},
    schedule::{Scheduler, TimerHandle, TimerId, TimerKind},
    utils::clock::Clock,
};

use super::{
    ambient::{CpuLevel, TimeOfDay},
    state::{Mood, MoodEvent, MoodStateMachine},
    MoodConfig,
};

/// Drives [MoodStateMachine] from user interaction, timers and ambient signals. Every mood change
/// is announced as [Notification::MoodChanged].
pub struct MoodController {
    machine: MoodStateMachine,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    activity: Arc<dyn ActivityMonitor>,
    notifier: Notifier,
    config: MoodConfig,

    revert_timer: Option<TimerHandle>,
    idle_timer: Option<TimerHandle>,
    day_night_timer: Option<TimerHandle>,
    activity_subscription: Option<Subscription>,
    /// Last observed night classification, `None` until the first check.
    night: Option<bool>,
}

impl MoodController {
    pub fn new(
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        activity: Arc<dyn ActivityMonitor>,
        config: MoodConfig,
        notifier: Notifier,
    ) -> Self {
        Self {
            machine: MoodStateMachine::new(),
            clock,
            scheduler,
            activity,
            notifier,
            config,
            revert_timer: None,
            idle_timer: None,
            day_night_timer: None,
            activity_subscription: None,
            night: None,
        }
    }

    pub fn current(&self) -> Mood {
        self.machine.current()
    }

    pub fn base(&self) -> Mood {
        self.machine.base()
    }

    /// Arms the idle and day/night timers and checks the time of day once.
    pub fn start(&mut self) {
        self.stop();
        self.activity_subscription = Some(self.activity.subscribe());
        self.day_night_timer = Some(
            self.scheduler
                .schedule_repeating(self.config.day_night_interval, TimerKind::DayNight),
        );
        self.reset_idle_timer();
        self.check_time_of_day();
    }

    pub fn stop(&mut self) {
        self.revert_timer = None;
        self.idle_timer = None;
        self.day_night_timer = None;
        if let Some(subscription) = self.activity_subscription.take() {
            subscription.unsubscribe();
        }
        self.night = None;
    }

    pub fn click(&mut self) {
        self.apply(MoodEvent::Clicked);
        self.schedule_revert();
        self.reset_idle_timer();
    }

    pub fn drag_started(&mut self) {
        self.apply(MoodEvent::DragStarted);
        self.schedule_revert();
        self.reset_idle_timer();
    }

    pub fn drag_ended(&mut self) {
        self.reset_idle_timer();
    }

    pub fn set_cpu_level(&mut self, level: CpuLevel) {
        debug!("CPU level is {level}");
        if let Some(mood) = self.machine.set_base_state(level.base_mood()) {
            self.notifier.notify(Notification::MoodChanged(mood));
        }
    }

    pub fn handle_timer(&mut self, id: TimerId, kind: TimerKind) {
        match kind {
            TimerKind::MoodRevert => {
                if Self::take_if_current(&mut self.revert_timer, id).is_some() {
                    self.apply(MoodEvent::TemporaryStateExpired);
                }
            }
            TimerKind::MoodIdle => {
                if Self::take_if_current(&mut self.idle_timer, id).is_some() {
                    self.apply(MoodEvent::IdleTimeout);
                }
            }
            TimerKind::DayNight => {
                if self.day_night_timer.as_ref().is_some_and(|t| t.is(id)) {
                    self.check_time_of_day();
                } else {
                    trace!("Ignoring retired day/night timer {id:?}");
                }
            }
            TimerKind::SessionTick => trace!("Session tick {id:?} is not a mood timer"),
        }
    }

    pub fn handle_activity(&mut self, subscription: SubscriptionId) {
        if self
            .activity_subscription
            .as_ref()
            .is_some_and(|current| current.is(subscription))
        {
            self.reset_idle_timer();
        }
    }

    /// One-shot timers are consumed by their firing.
    fn take_if_current(slot: &mut Option<TimerHandle>, id: TimerId) -> Option<TimerHandle> {
        if slot.as_ref().is_some_and(|t| t.is(id)) {
            slot.take()
        } else {
            trace!("Ignoring retired timer {id:?}");
            None
        }
    }

    fn schedule_revert(&mut self) {
        if let Some(previous) = self.revert_timer.take() {
            previous.cancel();
        }
        self.revert_timer = Some(
            self.scheduler
                .schedule_once(self.config.revert_after, TimerKind::MoodRevert),
        );
    }

    fn reset_idle_timer(&mut self) {
        if let Some(previous) = self.idle_timer.take() {
            previous.cancel();
        }
        self.idle_timer = Some(
            self.scheduler
                .schedule_once(self.config.idle_after, TimerKind::MoodIdle),
        );
    }

    fn check_time_of_day(&mut self) {
        let time_of_day = TimeOfDay::current(self.clock.as_ref());
        let night = time_of_day.is_night();
        if self.night == Some(night) {
            return;
        }
        info!("It is {time_of_day:?} now");
        self.night = Some(night);
        if night {
            self.apply(MoodEvent::NightTime);
        } else if self.machine.current() == Mood::Sleeping {
            self.apply(MoodEvent::DayTime);
        }
    }

    fn apply(&mut self, event: MoodEvent) {
        if let Some(mood) = self.machine.handle_event(event) {
            self.notifier.notify(Notification::MoodChanged(mood));
        }
    }
}
