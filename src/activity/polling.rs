use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::{
    companion::event::Event, schedule::IdGenerator, tracker::afk::AfkEvaluator,
    utils::clock::Clock, window_api::IdleSource,
};

use super::{ActivityMonitor, Subscription, SubscriptionId};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// [ActivityMonitor] that periodically asks the platform how long the user has been idle. Input
/// that happened since the previous poll is reported as one activity notification.
pub struct IdlePollingMonitor {
    source: Arc<Mutex<Box<dyn IdleSource>>>,
    sender: mpsc::UnboundedSender<Event>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    ids: IdGenerator,
}

impl IdlePollingMonitor {
    pub fn new(
        source: Box<dyn IdleSource>,
        sender: mpsc::UnboundedSender<Event>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            sender,
            clock,
            poll_interval,
            ids: IdGenerator::default(),
        }
    }
}

impl ActivityMonitor for IdlePollingMonitor {
    fn subscribe(&self) -> Subscription {
        let subscription = SubscriptionId(self.ids.next());
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let source = self.source.clone();
        let sender = self.sender.clone();
        let clock = self.clock.clone();
        let poll_interval = self.poll_interval;
        // Anything idle for less than a poll interval happened since the previous poll.
        let recent = AfkEvaluator::new(poll_interval);
        let mut poll_point = clock.instant();

        tokio::spawn(async move {
            debug!("Polling idle time for {subscription:?}");
            loop {
                poll_point += poll_interval;

                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {
                        debug!("Stopped polling idle time for {subscription:?}");
                        return
                    }
                    _ = clock.sleep_until(poll_point) => ()
                }

                let idle = source.lock().await.get_idle_time();
                match idle {
                    Ok(idle_ms) if !recent.is_afk(Duration::from_millis(idle_ms.into())) => {
                        trace!("User input {idle_ms}ms ago");
                        if sender.send(Event::Activity { subscription }).is_err() {
                            return;
                        }
                    }
                    Ok(_) => (),
                    Err(e) => {
                        error!("Encountered an error during idle time collection {:?}", e)
                    }
                }
            }
        });

        Subscription::new(subscription, token)
    }
}
