use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use tokio::time::Instant;

/// Represents an entity responsible for providing time across application. Wall clock time is
/// local, since day boundaries and night detection follow the user's calendar. This allows
/// engines to be tested with a simulated clock.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> NaiveDateTime;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: tokio::time::Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: tokio::time::Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
