//! Sources of "the user did something" notifications.
//!
//! Like timers, monitors only push [Event::Activity] into the companion queue. Whatever thread the
//! input is observed on, it is applied on the companion's own context.

pub mod polling;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::trace;

use crate::{companion::event::Event, schedule::IdGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Live subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    guard: DropGuard,
}

impl Subscription {
    pub fn new(id: SubscriptionId, token: CancellationToken) -> Self {
        Self {
            id,
            guard: token.drop_guard(),
        }
    }

    pub fn is(&self, id: SubscriptionId) -> bool {
        self.id == id
    }

    pub fn unsubscribe(self) {
        self.guard.disarm().cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}

pub trait ActivityMonitor: Send + Sync {
    fn subscribe(&self) -> Subscription;
}

/// Monitor driven by explicit [ManualActivityMonitor::fire] calls. The console host fires it for
/// every line it reads, tests fire it directly.
pub struct ManualActivityMonitor {
    sender: mpsc::UnboundedSender<Event>,
    subscribers: Mutex<Vec<(SubscriptionId, CancellationToken)>>,
    ids: IdGenerator,
}

impl ManualActivityMonitor {
    pub fn new(sender: mpsc::UnboundedSender<Event>) -> Arc<Self> {
        Arc::new(Self {
            sender,
            subscribers: Mutex::default(),
            ids: IdGenerator::default(),
        })
    }

    pub fn fire(&self) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|(_, token)| !token.is_cancelled());
        for (subscription, _) in subscribers.iter() {
            trace!("Delivering activity to {subscription:?}");
            let _ = self.sender.send(Event::Activity {
                subscription: *subscription,
            });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|(_, token)| !token.is_cancelled());
        subscribers.len()
    }
}

impl ActivityMonitor for ManualActivityMonitor {
    fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.ids.next());
        let token = CancellationToken::new();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, token.clone()));
        Subscription::new(id, token)
    }
}
