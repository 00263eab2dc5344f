use std::{
    collections::BTreeMap,
    future::Future,
    io::{ErrorKind, Write},
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tracing::{debug, info};

use crate::utils::clock::Clock;

use super::{
    category::Category,
    entities::{DayHistory, HistoryEntity},
};

/// Interface for abstracting storage of tracked time. Durations are only ever added, so repeated
/// or reordered calls can't corrupt what is already stored.
pub trait HistoryStore {
    fn add_duration(
        &self,
        seconds: f64,
        date: NaiveDate,
        category: &Category,
    ) -> impl Future<Output = Result<()>>;

    fn total_duration(
        &self,
        date: NaiveDate,
        category: &Category,
    ) -> impl Future<Output = Result<f64>>;

    fn today_total(&self) -> impl Future<Output = Result<f64>>;

    fn today_breakdown(&self) -> impl Future<Output = Result<BTreeMap<Category, f64>>>;

    /// Days with recorded time among today and the `days - 1` days before it, newest first.
    fn recent_history(&self, days: u32) -> impl Future<Output = Result<Vec<DayHistory>>>;

    fn presets(&self) -> impl Future<Output = Result<Vec<String>>>;

    fn add_preset(&self, name: &str) -> impl Future<Output = Result<()>>;

    fn remove_preset(&self, name: &str) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> HistoryStore for T
where
    T::Target: HistoryStore,
{
    fn add_duration(
        &self,
        seconds: f64,
        date: NaiveDate,
        category: &Category,
    ) -> impl Future<Output = Result<()>> {
        self.deref().add_duration(seconds, date, category)
    }

    fn total_duration(
        &self,
        date: NaiveDate,
        category: &Category,
    ) -> impl Future<Output = Result<f64>> {
        self.deref().total_duration(date, category)
    }

    fn today_total(&self) -> impl Future<Output = Result<f64>> {
        self.deref().today_total()
    }

    fn today_breakdown(&self) -> impl Future<Output = Result<BTreeMap<Category, f64>>> {
        self.deref().today_breakdown()
    }

    fn recent_history(&self, days: u32) -> impl Future<Output = Result<Vec<DayHistory>>> {
        self.deref().recent_history(days)
    }

    fn presets(&self) -> impl Future<Output = Result<Vec<String>>> {
        self.deref().presets()
    }

    fn add_preset(&self, name: &str) -> impl Future<Output = Result<()>> {
        self.deref().add_preset(name)
    }

    fn remove_preset(&self, name: &str) -> impl Future<Output = Result<()>> {
        self.deref().remove_preset(name)
    }
}

pub const HISTORY_FILE_NAME: &str = "history.json";
const LOCK_FILE_NAME: &str = "history.lock";

/// The main realization of [HistoryStore]. Keeps the whole history in a single json document,
/// guarded by file locks so that the CLI and a running companion can share it.
///
/// The document is never written in place. A new version is written next to it and renamed over
/// it, so an interrupted write leaves the previous version intact. A document that can't be parsed
/// is never overwritten; every operation fails until it's repaired or moved away.
pub struct JsonHistoryStore {
    dir: PathBuf,
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonHistoryStore {
    pub fn new(dir: PathBuf, clock: Arc<dyn Clock>) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            path: dir.join(HISTORY_FILE_NAME),
            dir,
            clock,
        })
    }

    fn today(&self) -> NaiveDate {
        self.clock.time().date()
    }

    fn parse(path: &Path, content: &str) -> Result<HistoryEntity> {
        if content.trim().is_empty() {
            return Ok(HistoryEntity::default());
        }
        serde_json::from_str(content).with_context(|| {
            format!("History in {path:?} can't be parsed, repair or move it away to continue")
        })
    }

    /// The document is replaced by renaming, so locks are held on a separate file that stays put.
    async fn lock_file(&self) -> Result<File> {
        Ok(File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE_NAME))
            .await?)
    }

    async fn read_document(&self) -> Result<HistoryEntity> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HistoryEntity::default()),
            Err(e) => Err(e)?,
        };
        Self::parse(&self.path, &content)
    }

    async fn load(&self) -> Result<HistoryEntity> {
        let lock = self.lock_file().await?;
        lock.lock_shared()?;
        let result = self.read_document().await;
        lock.unlock_async().await?;
        result
    }

    /// Read-modify-write of the whole document under an exclusive lock.
    async fn modify<T>(&self, change: impl FnOnce(&mut HistoryEntity) -> Result<T>) -> Result<T> {
        let lock = self.lock_file().await?;

        // Semi-safe acquire-release for a file
        lock.lock_exclusive()?;
        let result = self.modify_locked(change).await;
        lock.unlock_async().await?;
        result
    }

    async fn modify_locked<T>(
        &self,
        change: impl FnOnce(&mut HistoryEntity) -> Result<T>,
    ) -> Result<T> {
        let mut history = self.read_document().await?;

        let result = change(&mut history)?;

        let buffer = serde_json::to_vec_pretty(&history)?;
        let dir = self.dir.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::replace(&dir, &path, &buffer)).await??;
        Ok(result)
    }

    fn replace(dir: &Path, path: &Path, buffer: &[u8]) -> Result<()> {
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(buffer)?;
        file.as_file().sync_all()?;
        file.persist(path)?;
        Ok(())
    }
}

impl HistoryStore for JsonHistoryStore {
    async fn add_duration(&self, seconds: f64, date: NaiveDate, category: &Category) -> Result<()> {
        self.modify(|history| history.add_duration(seconds, date, category))
            .await?;
        debug!("Stored {seconds}s for {date} under {category}");
        Ok(())
    }

    async fn total_duration(&self, date: NaiveDate, category: &Category) -> Result<f64> {
        let history = self.load().await?;
        Ok(history
            .day(date)
            .map(|day| day.get(category))
            .unwrap_or_default())
    }

    async fn today_total(&self) -> Result<f64> {
        let history = self.load().await?;
        Ok(history
            .day(self.today())
            .map(|day| day.total())
            .unwrap_or_default())
    }

    async fn today_breakdown(&self) -> Result<BTreeMap<Category, f64>> {
        let history = self.load().await?;
        Ok(history
            .day(self.today())
            .map(|day| day.breakdown())
            .unwrap_or_default())
    }

    async fn recent_history(&self, days: u32) -> Result<Vec<DayHistory>> {
        let history = self.load().await?;
        Ok(history.recent_history(self.today(), days))
    }

    async fn presets(&self) -> Result<Vec<String>> {
        Ok(self.load().await?.presets)
    }

    async fn add_preset(&self, name: &str) -> Result<()> {
        if self.modify(|history| history.add_preset(name)).await? {
            info!("Added preset {name:?}");
        }
        Ok(())
    }

    async fn remove_preset(&self, name: &str) -> Result<()> {
        if self
            .modify(|history| Ok(history.remove_preset(name)))
            .await?
        {
            info!("Removed preset {name:?}");
        }
        Ok(())
    }
}
