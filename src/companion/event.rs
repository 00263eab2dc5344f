use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::{
    activity::SubscriptionId,
    mood::{ambient::CpuLevel, state::Mood},
    schedule::{TimerId, TimerKind},
    tracker::SessionState,
};

/// Everything the companion reacts to. Timers, activity monitors and the UI all feed the same
/// queue, which is drained by a single consumer.
#[derive(Debug)]
pub enum Event {
    Timer { id: TimerId, kind: TimerKind },
    Activity { subscription: SubscriptionId },
    Command(Command),
}

/// Requests coming from the UI layer.
#[derive(Debug)]
pub enum Command {
    Click,
    DragStarted,
    DragEnded,
    SetCpuLevel(CpuLevel),
    StartTracking,
    StopTracking,
    SwitchPreset(String),
    ClearPreset,
    TodayTotal(oneshot::Sender<f64>),
}

/// Outbound changes for the UI layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    MoodChanged(Mood),
    SessionTick {
        elapsed_seconds: u64,
        state: SessionState,
    },
    SessionStateChanged(SessionState),
}

/// Sending side of the notification channel. Both engines hold a clone so the UI reads a single
/// stream.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    sender: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
    pub fn new(sender: mpsc::UnboundedSender<Notification>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn notify(&self, notification: Notification) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(notification).is_err() {
            trace!("Nobody is listening for {notification:?}");
        }
    }
}
