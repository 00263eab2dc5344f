use std::{sync::Arc, time::Duration};

use chrono::NaiveDateTime;
use tracing::{debug, error, info, trace};

use crate::{
    activity::{ActivityMonitor, Subscription, SubscriptionId},
    companion::event::{Notification, Notifier},
    schedule::{Scheduler, TimerHandle, TimerId, TimerKind},
    storage::{category::Category, history_store::HistoryStore},
    utils::clock::Clock,
};

use super::{afk::AfkEvaluator, SessionState, TrackerConfig};

/// Accumulates work time for the current preset and flushes it into the history store.
///
/// Every second of tracked time ends up in exactly one `(date, category)` record: time is flushed
/// on stop, before a preset switch and when a tick notices that the calendar date changed.
pub struct WorkSessionTracker<S> {
    store: S,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    activity: Arc<dyn ActivityMonitor>,
    notifier: Notifier,
    tick_interval: Duration,
    afk_evaluator: AfkEvaluator,

    state: SessionState,
    elapsed: Duration,
    session_start: Option<NaiveDateTime>,
    last_activity: Option<NaiveDateTime>,
    current_preset: Category,
    tick_timer: Option<TimerHandle>,
    activity_subscription: Option<Subscription>,
}

impl<S: HistoryStore> WorkSessionTracker<S> {
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        activity: Arc<dyn ActivityMonitor>,
        config: TrackerConfig,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            clock,
            scheduler,
            activity,
            notifier,
            tick_interval: config.tick_interval,
            afk_evaluator: AfkEvaluator::new(config.idle_threshold),
            state: SessionState::Idle,
            elapsed: Duration::ZERO,
            session_start: None,
            last_activity: None,
            current_preset: Category::Uncategorized,
            tick_timer: None,
            activity_subscription: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Time tracked since the last flush.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn current_preset(&self) -> &Category {
        &self.current_preset
    }

    pub fn start(&mut self) {
        if self.state != SessionState::Idle {
            debug!("Ignoring start, session is already {}", self.state);
            return;
        }
        let now = self.clock.time();
        self.elapsed = Duration::ZERO;
        self.session_start = Some(now);
        self.last_activity = Some(now);
        self.transition(SessionState::Tracking);

        self.retire_sources();
        self.tick_timer = Some(
            self.scheduler
                .schedule_repeating(self.tick_interval, TimerKind::SessionTick),
        );
        self.activity_subscription = Some(self.activity.subscribe());
        info!("Started session at {now} for {}", self.current_preset);
    }

    pub async fn stop(&mut self) {
        if self.state == SessionState::Idle {
            debug!("Ignoring stop, no session is running");
            return;
        }
        self.retire_sources();
        self.flush().await;
        self.session_start = None;
        self.last_activity = None;
        self.transition(SessionState::Idle);
        info!("Stopped session");
    }

    /// Attributes time from now on to `preset`. Time tracked so far stays with the previous one.
    pub async fn switch_preset(&mut self, preset: impl Into<String>) {
        self.change_preset(Category::named(preset)).await
    }

    pub async fn clear_preset(&mut self) {
        self.change_preset(Category::Uncategorized).await
    }

    /// Stored time for today plus whatever hasn't been flushed yet.
    pub async fn today_total(&self) -> f64 {
        let stored = self.store.today_total().await.unwrap_or_else(|e| {
            error!("Failed to read today's total {e:?}");
            0.
        });
        match self.state {
            SessionState::Idle => stored,
            SessionState::Tracking | SessionState::Paused => stored + self.elapsed.as_secs_f64(),
        }
    }

    pub async fn handle_timer(&mut self, id: TimerId) {
        if !self.tick_timer.as_ref().is_some_and(|timer| timer.is(id)) {
            trace!("Ignoring tick from retired timer {id:?}");
            return;
        }
        self.tick().await
    }

    pub fn handle_activity(&mut self, subscription: SubscriptionId) {
        if !self
            .activity_subscription
            .as_ref()
            .is_some_and(|current| current.is(subscription))
        {
            trace!("Ignoring activity from retired {subscription:?}");
            return;
        }
        self.last_activity = Some(self.clock.time());
        if self.state == SessionState::Paused {
            info!("Activity detected, resuming session");
            self.transition(SessionState::Tracking);
        }
    }

    async fn tick(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        let now = self.clock.time();

        if let Some(start) = self.session_start {
            if start.date() != now.date() {
                info!("Day changed since {start}, closing the previous day");
                self.flush().await;
                self.session_start = Some(now);
            }
        }

        if self.state == SessionState::Tracking {
            let idle = self
                .last_activity
                .and_then(|last| (now - last).to_std().ok())
                .unwrap_or_default();
            if self.afk_evaluator.is_afk(idle) {
                info!("No activity for {}s, pausing session", idle.as_secs());
                self.transition(SessionState::Paused);
            }
        }

        // Paused sessions still tick so the UI can show the frozen value.
        if self.state == SessionState::Tracking {
            self.elapsed += self.tick_interval;
        }
        self.notifier.notify(Notification::SessionTick {
            elapsed_seconds: self.elapsed.as_secs(),
            state: self.state,
        });
    }

    async fn change_preset(&mut self, preset: Category) {
        if self.state != SessionState::Idle && !self.elapsed.is_zero() {
            self.flush().await;
            self.session_start = Some(self.clock.time());
        }
        debug!("Preset {} -> {preset}", self.current_preset);
        self.current_preset = preset;
    }

    /// Moves elapsed time into the store under the session's date. Store failures lose the time
    /// but never the session.
    async fn flush(&mut self) {
        let elapsed = std::mem::take(&mut self.elapsed);
        if elapsed.is_zero() {
            return;
        }
        let date = self
            .session_start
            .unwrap_or_else(|| self.clock.time())
            .date();
        let seconds = elapsed.as_secs_f64();
        match self
            .store
            .add_duration(seconds, date, &self.current_preset)
            .await
        {
            Ok(()) => info!("Flushed {seconds}s for {date} under {}", self.current_preset),
            Err(e) => error!(
                "Failed to store {seconds}s for {date} under {}: {e:?}",
                self.current_preset
            ),
        }
    }

    fn retire_sources(&mut self) {
        if let Some(timer) = self.tick_timer.take() {
            timer.cancel();
        }
        if let Some(subscription) = self.activity_subscription.take() {
            subscription.unsubscribe();
        }
    }

    fn transition(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!("Session {} -> {state}", self.state);
        self.state = state;
        self.notifier.notify(Notification::SessionStateChanged(state));
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use chrono::NaiveDate;
    use tokio::sync::mpsc;

    use crate::{
        activity::ManualActivityMonitor,
        companion::event::{Event, Notification, Notifier},
        schedule::TokioScheduler,
        storage::{
            category::Category, entities::DayHistory, history_store::HistoryStore,
            memory::MemoryHistoryStore,
        },
        tracker::{SessionState, TrackerConfig},
        utils::{
            clock::test_clock::{test_date, TestClock},
            logging::TEST_LOGGING,
        },
    };

    use super::WorkSessionTracker;

    type Flush = (f64, NaiveDate, Category);

    /// Memory store that remembers every `add_duration` call and can be told to fail writes.
    struct RecordingStore {
        inner: MemoryHistoryStore,
        flushes: Mutex<Vec<Flush>>,
        failing: bool,
    }

    impl RecordingStore {
        fn flushes(&self) -> Vec<Flush> {
            self.flushes.lock().unwrap().clone()
        }
    }

    impl HistoryStore for RecordingStore {
        async fn add_duration(
            &self,
            seconds: f64,
            date: NaiveDate,
            category: &Category,
        ) -> Result<()> {
            if self.failing {
                return Err(anyhow!("disk is full"));
            }
            self.flushes
                .lock()
                .unwrap()
                .push((seconds, date, category.clone()));
            self.inner.add_duration(seconds, date, category).await
        }

        async fn total_duration(&self, date: NaiveDate, category: &Category) -> Result<f64> {
            self.inner.total_duration(date, category).await
        }

        async fn today_total(&self) -> Result<f64> {
            self.inner.today_total().await
        }

        async fn today_breakdown(&self) -> Result<BTreeMap<Category, f64>> {
            self.inner.today_breakdown().await
        }

        async fn recent_history(&self, days: u32) -> Result<Vec<DayHistory>> {
            self.inner.recent_history(days).await
        }

        async fn presets(&self) -> Result<Vec<String>> {
            self.inner.presets().await
        }

        async fn add_preset(&self, name: &str) -> Result<()> {
            self.inner.add_preset(name).await
        }

        async fn remove_preset(&self, name: &str) -> Result<()> {
            self.inner.remove_preset(name).await
        }
    }

    struct Harness {
        tracker: WorkSessionTracker<Arc<RecordingStore>>,
        store: Arc<RecordingStore>,
        activity: Arc<ManualActivityMonitor>,
        events: mpsc::UnboundedReceiver<Event>,
        notifications: mpsc::UnboundedReceiver<Notification>,
    }

    impl Harness {
        fn new(clock: TestClock, config: TrackerConfig) -> Self {
            Self::with_store(clock, config, false)
        }

        fn with_store(clock: TestClock, config: TrackerConfig, failing: bool) -> Self {
            *TEST_LOGGING;
            let clock = Arc::new(clock);
            let (sender, events) = mpsc::unbounded_channel();
            let (notifier, notifications) = Notifier::channel();
            let store = Arc::new(RecordingStore {
                inner: MemoryHistoryStore::new(clock.clone()),
                flushes: Mutex::default(),
                failing,
            });
            let activity = ManualActivityMonitor::new(sender.clone());
            let tracker = WorkSessionTracker::new(
                store.clone(),
                clock.clone(),
                Arc::new(TokioScheduler::new(sender, clock)),
                activity.clone(),
                config,
                notifier,
            );
            Self {
                tracker,
                store,
                activity,
                events,
                notifications,
            }
        }

        /// Waits for the next queued event, letting paused time run forward, and applies it.
        async fn step(&mut self) {
            match self.events.recv().await {
                Some(Event::Timer { id, .. }) => self.tracker.handle_timer(id).await,
                Some(Event::Activity { subscription }) => {
                    self.tracker.handle_activity(subscription)
                }
                other => panic!("Unexpected {other:?}"),
            }
        }

        async fn ticks(&mut self, count: usize) {
            for _ in 0..count {
                self.step().await;
            }
        }

        fn drain_notifications(&mut self) -> Vec<Notification> {
            let mut result = vec![];
            while let Ok(v) = self.notifications.try_recv() {
                result.push(v);
            }
            result
        }
    }

    fn noon() -> TestClock {
        TestClock::at_hms(12, 0, 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_is_idle() {
        let harness = Harness::new(noon(), TrackerConfig::default());
        assert_eq!(harness.tracker.state(), SessionState::Idle);
        assert_eq!(harness.tracker.elapsed(), Duration::ZERO);
        assert_eq!(harness.tracker.current_preset(), &Category::Uncategorized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_ticks_stores_nothing() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.start();
        harness.tracker.stop().await;

        assert_eq!(harness.tracker.state(), SessionState::Idle);
        assert!(harness.store.flushes().is_empty());
        assert_eq!(
            harness.drain_notifications(),
            vec![
                Notification::SessionStateChanged(SessionState::Tracking),
                Notification::SessionStateChanged(SessionState::Idle),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_tick_is_flushed_once() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.switch_preset("ProjectA").await;
        harness.tracker.start();
        harness.ticks(1).await;
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(1));

        harness.tracker.stop().await;

        assert_eq!(
            harness.store.flushes(),
            vec![(1., test_date(), Category::named("ProjectA"))]
        );
        assert_eq!(harness.tracker.elapsed(), Duration::ZERO);
        assert_eq!(
            harness
                .store
                .total_duration(test_date(), &Category::named("ProjectA"))
                .await
                .unwrap(),
            1.
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_notified() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.start();
        harness.ticks(2).await;

        assert_eq!(
            harness.drain_notifications(),
            vec![
                Notification::SessionStateChanged(SessionState::Tracking),
                Notification::SessionTick {
                    elapsed_seconds: 1,
                    state: SessionState::Tracking
                },
                Notification::SessionTick {
                    elapsed_seconds: 2,
                    state: SessionState::Tracking
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_idempotent() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.start();
        harness.ticks(1).await;
        harness.tracker.start();

        assert_eq!(harness.tracker.state(), SessionState::Tracking);
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(1));
        assert_eq!(harness.activity.subscriber_count(), 1);

        harness.ticks(1).await;
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(2));
        let state_changes = harness
            .drain_notifications()
            .into_iter()
            .filter(|v| matches!(v, Notification::SessionStateChanged(_)))
            .count();
        assert_eq!(state_changes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_idle_does_nothing() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.stop().await;
        assert_eq!(harness.tracker.state(), SessionState::Idle);
        assert!(harness.drain_notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_retires_tick_and_subscription() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.start();
        assert_eq!(harness.activity.subscriber_count(), 1);
        harness.tracker.stop().await;
        assert_eq!(harness.activity.subscriber_count(), 0);

        harness.activity.fire();
        tokio::time::advance(Duration::from_secs(5)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(harness.events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_ignores_stale_tick() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.start();

        // Let the first tick reach the queue without applying it.
        tokio::time::advance(Duration::from_secs(1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        harness.tracker.stop().await;
        harness.tracker.start();

        harness.step().await;
        assert_eq!(harness.tracker.elapsed(), Duration::ZERO);

        harness.step().await;
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(1));
        assert!(harness.store.flushes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_preset_flushes_and_keeps_running() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.switch_preset("A").await;
        harness.tracker.start();
        harness.ticks(2).await;

        harness.tracker.switch_preset("B").await;
        assert_eq!(harness.tracker.state(), SessionState::Tracking);
        assert_eq!(harness.tracker.elapsed(), Duration::ZERO);
        assert_eq!(harness.tracker.current_preset(), &Category::named("B"));
        assert_eq!(
            harness.store.flushes(),
            vec![(2., test_date(), Category::named("A"))]
        );

        harness.ticks(1).await;
        harness.tracker.clear_preset().await;
        harness.ticks(3).await;
        harness.tracker.stop().await;

        assert_eq!(
            harness.store.flushes(),
            vec![
                (2., test_date(), Category::named("A")),
                (1., test_date(), Category::named("B")),
                (3., test_date(), Category::Uncategorized),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_preset_while_idle_only_sets_it() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness.tracker.switch_preset("B").await;
        assert_eq!(harness.tracker.current_preset(), &Category::named("B"));
        assert_eq!(harness.tracker.state(), SessionState::Idle);
        assert!(harness.store.flushes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_user_pauses_and_activity_resumes() {
        let config = TrackerConfig {
            idle_threshold: Duration::from_secs(3),
            ..TrackerConfig::default()
        };
        let mut harness = Harness::new(noon(), config);
        harness.tracker.start();

        harness.ticks(2).await;
        assert_eq!(harness.tracker.state(), SessionState::Tracking);
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(2));

        harness.ticks(1).await;
        assert_eq!(harness.tracker.state(), SessionState::Paused);
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(2));

        harness.ticks(2).await;
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(2));

        harness.activity.fire();
        harness.step().await;
        assert_eq!(harness.tracker.state(), SessionState::Tracking);
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(2));

        harness.ticks(1).await;
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(3));

        harness.tracker.stop().await;
        assert_eq!(
            harness.store.flushes(),
            vec![(3., test_date(), Category::Uncategorized)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_ticks_report_frozen_time() {
        let config = TrackerConfig {
            idle_threshold: Duration::from_secs(1),
            ..TrackerConfig::default()
        };
        let mut harness = Harness::new(noon(), config);
        harness.tracker.start();
        harness.ticks(2).await;

        let ticks = harness
            .drain_notifications()
            .into_iter()
            .filter(|v| matches!(v, Notification::SessionTick { .. }))
            .collect::<Vec<_>>();
        assert_eq!(
            ticks,
            vec![
                Notification::SessionTick {
                    elapsed_seconds: 0,
                    state: SessionState::Paused
                },
                Notification::SessionTick {
                    elapsed_seconds: 0,
                    state: SessionState::Paused
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_preset_keeps_paused_state() {
        let config = TrackerConfig {
            idle_threshold: Duration::from_secs(2),
            ..TrackerConfig::default()
        };
        let mut harness = Harness::new(noon(), config);
        harness.tracker.start();
        harness.ticks(2).await;
        assert_eq!(harness.tracker.state(), SessionState::Paused);

        harness.tracker.switch_preset("B").await;
        assert_eq!(harness.tracker.state(), SessionState::Paused);
        assert_eq!(
            harness.store.flushes(),
            vec![(1., test_date(), Category::Uncategorized)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_day_rollover_splits_session() {
        let mut harness = Harness::new(TestClock::at_hms(23, 59, 58), TrackerConfig::default());
        let next_day = test_date().succ_opt().unwrap();
        harness.tracker.start();

        harness.ticks(1).await;
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(1));

        // 00:00:00, the previous day is closed before counting this tick.
        harness.ticks(1).await;
        assert_eq!(
            harness.store.flushes(),
            vec![(1., test_date(), Category::Uncategorized)]
        );
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(1));

        harness.ticks(1).await;
        harness.tracker.stop().await;

        let flushes = harness.store.flushes();
        assert_eq!(
            flushes,
            vec![
                (1., test_date(), Category::Uncategorized),
                (2., next_day, Category::Uncategorized),
            ]
        );
        assert_eq!(flushes.iter().map(|v| v.0).sum::<f64>(), 3.);
    }

    #[tokio::test(start_paused = true)]
    async fn test_day_rollover_while_paused() {
        let config = TrackerConfig {
            idle_threshold: Duration::from_secs(2),
            ..TrackerConfig::default()
        };
        let mut harness = Harness::new(TestClock::at_hms(23, 59, 57), config);
        let next_day = test_date().succ_opt().unwrap();
        harness.tracker.start();

        // 23:59:58 counted, 23:59:59 pauses.
        harness.ticks(2).await;
        assert_eq!(harness.tracker.state(), SessionState::Paused);
        assert_eq!(harness.tracker.elapsed(), Duration::from_secs(1));

        // 00:00:00 closes the previous day and stays paused.
        harness.ticks(1).await;
        assert_eq!(harness.tracker.state(), SessionState::Paused);
        assert_eq!(harness.tracker.elapsed(), Duration::ZERO);
        assert_eq!(
            harness.store.flushes(),
            vec![(1., test_date(), Category::Uncategorized)]
        );

        harness.activity.fire();
        harness.step().await;
        assert_eq!(harness.tracker.state(), SessionState::Tracking);
        harness.ticks(1).await;
        harness.tracker.stop().await;

        let flushes = harness.store.flushes();
        assert_eq!(
            flushes,
            vec![
                (1., test_date(), Category::Uncategorized),
                (1., next_day, Category::Uncategorized),
            ]
        );
        assert_eq!(flushes.iter().filter(|v| v.1 == next_day).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_today_total_includes_unflushed_time() {
        let mut harness = Harness::new(noon(), TrackerConfig::default());
        harness
            .store
            .add_duration(100., test_date(), &Category::named("A"))
            .await
            .unwrap();
        assert_eq!(harness.tracker.today_total().await, 100.);

        harness.tracker.start();
        harness.ticks(2).await;
        assert_eq!(harness.tracker.today_total().await, 102.);

        harness.tracker.stop().await;
        assert_eq!(harness.tracker.today_total().await, 102.);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failures_are_swallowed() {
        let mut harness = Harness::with_store(noon(), TrackerConfig::default(), true);
        harness.tracker.start();
        harness.ticks(2).await;

        harness.tracker.switch_preset("B").await;
        assert_eq!(harness.tracker.state(), SessionState::Tracking);
        assert_eq!(harness.tracker.elapsed(), Duration::ZERO);

        harness.ticks(1).await;
        harness.tracker.stop().await;
        assert_eq!(harness.tracker.state(), SessionState::Idle);
        assert_eq!(harness.tracker.elapsed(), Duration::ZERO);
        assert_eq!(harness.tracker.today_total().await, 0.);
    }
}
