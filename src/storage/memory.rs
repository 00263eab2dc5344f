use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::Result;
use chrono::NaiveDate;

use crate::utils::clock::Clock;

use super::{
    category::Category,
    entities::{DayHistory, HistoryEntity},
    history_store::HistoryStore,
};

/// [HistoryStore] that keeps everything in memory. Nothing survives the process.
pub struct MemoryHistoryStore {
    history: Mutex<HistoryEntity>,
    clock: Arc<dyn Clock>,
}

impl MemoryHistoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            history: Mutex::default(),
            clock,
        }
    }

    fn history(&self) -> MutexGuard<'_, HistoryEntity> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn today(&self) -> NaiveDate {
        self.clock.time().date()
    }
}

impl HistoryStore for MemoryHistoryStore {
    async fn add_duration(&self, seconds: f64, date: NaiveDate, category: &Category) -> Result<()> {
        self.history().add_duration(seconds, date, category)
    }

    async fn total_duration(&self, date: NaiveDate, category: &Category) -> Result<f64> {
        Ok(self
            .history()
            .day(date)
            .map(|day| day.get(category))
            .unwrap_or_default())
    }

    async fn today_total(&self) -> Result<f64> {
        let today = self.today();
        Ok(self
            .history()
            .day(today)
            .map(|day| day.total())
            .unwrap_or_default())
    }

    async fn today_breakdown(&self) -> Result<BTreeMap<Category, f64>> {
        let today = self.today();
        Ok(self
            .history()
            .day(today)
            .map(|day| day.breakdown())
            .unwrap_or_default())
    }

    async fn recent_history(&self, days: u32) -> Result<Vec<DayHistory>> {
        let today = self.today();
        Ok(self.history().recent_history(today, days))
    }

    async fn presets(&self) -> Result<Vec<String>> {
        Ok(self.history().presets.clone())
    }

    async fn add_preset(&self, name: &str) -> Result<()> {
        self.history().add_preset(name).map(|_| ())
    }

    async fn remove_preset(&self, name: &str) -> Result<()> {
        self.history().remove_preset(name);
        Ok(())
    }
}
