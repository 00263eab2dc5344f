use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::utils::time::{date_key, parse_date_key};

use super::category::Category;

/// The document stored on disk. Days are keyed by `YYYY-MM-DD`.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct HistoryEntity {
    #[serde(default)]
    pub days: BTreeMap<String, DayEntity>,
    #[serde(default)]
    pub presets: Vec<String>,
}

impl HistoryEntity {
    pub fn add_duration(
        &mut self,
        seconds: f64,
        date: NaiveDate,
        category: &Category,
    ) -> Result<()> {
        if !seconds.is_finite() || seconds < 0. {
            bail!("Can't add {seconds} seconds, durations are never negative");
        }
        self.days
            .entry(date_key(date))
            .or_default()
            .add(category, seconds);
        Ok(())
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayEntity> {
        self.days.get(&date_key(date))
    }

    /// Days with recorded time from `today - (days - 1)` up to `today`, newest first.
    pub fn recent_history(&self, today: NaiveDate, days: u32) -> Vec<DayHistory> {
        let Some(first) = days
            .checked_sub(1)
            .and_then(|back| today.checked_sub_signed(Duration::days(back.into())))
        else {
            return vec![];
        };
        let (from, to) = (date_key(first), date_key(today));
        self.days
            .range(from..=to)
            .rev()
            .filter(|(_, day)| !day.is_empty())
            .filter_map(|(key, day)| Some(DayHistory::new(parse_date_key(key)?, day)))
            .collect()
    }

    /// Adds a preset name. Returns false when it was already present.
    pub fn add_preset(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Preset name can't be empty");
        }
        if self.presets.iter().any(|v| v == name) {
            return Ok(false);
        }
        self.presets.push(name.to_string());
        Ok(true)
    }

    /// Removes a preset name. Recorded time for it is kept.
    pub fn remove_preset(&mut self, name: &str) -> bool {
        let before = self.presets.len();
        self.presets.retain(|v| v != name.trim());
        before != self.presets.len()
    }
}

/// Accumulated seconds for one day. Uncategorized time lives outside of the named map so that no
/// preset name is reserved.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct DayEntity {
    #[serde(default)]
    pub uncategorized: f64,
    #[serde(default)]
    pub categories: BTreeMap<String, f64>,
}

impl DayEntity {
    pub fn add(&mut self, category: &Category, seconds: f64) {
        match category {
            Category::Uncategorized => self.uncategorized += seconds,
            Category::Named(name) => *self.categories.entry(name.clone()).or_default() += seconds,
        }
    }

    pub fn get(&self, category: &Category) -> f64 {
        match category {
            Category::Uncategorized => self.uncategorized,
            Category::Named(name) => self.categories.get(name).copied().unwrap_or_default(),
        }
    }

    pub fn total(&self) -> f64 {
        self.uncategorized + self.categories.values().sum::<f64>()
    }

    pub fn breakdown(&self) -> BTreeMap<Category, f64> {
        let mut breakdown = self
            .categories
            .iter()
            .map(|(name, seconds)| (Category::named(name.as_str()), *seconds))
            .collect::<BTreeMap<_, _>>();
        if self.uncategorized > 0. {
            breakdown.insert(Category::Uncategorized, self.uncategorized);
        }
        breakdown
    }

    pub fn is_empty(&self) -> bool {
        self.total() <= 0.
    }
}

/// One day of history as presented to callers.
#[derive(PartialEq, Debug, Clone)]
pub struct DayHistory {
    pub date: NaiveDate,
    pub total: f64,
    pub categories: BTreeMap<Category, f64>,
}

impl DayHistory {
    pub fn new(date: NaiveDate, day: &DayEntity) -> Self {
        Self {
            date,
            total: day.total(),
            categories: day.breakdown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use crate::storage::category::Category;

    use super::{DayEntity, HistoryEntity};

    #[test]
    fn test_day_keeps_uncategorized_apart() {
        let mut day = DayEntity::default();
        day.add(&Category::Uncategorized, 10.);
        day.add(&Category::named("__none__"), 5.);
        day.add(&Category::named("__none__"), 2.);

        assert_eq!(day.get(&Category::Uncategorized), 10.);
        assert_eq!(day.get(&Category::named("__none__")), 7.);
        assert_eq!(day.total(), 17.);
        assert_eq!(day.breakdown().len(), 2);
    }

    #[test]
    fn test_recent_history_window() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let mut history = HistoryEntity::default();
        history.add_duration(60., today, &Category::Uncategorized).unwrap();
        history
            .add_duration(30., today - Duration::days(1), &Category::named("A"))
            .unwrap();
        history
            .add_duration(0., today - Duration::days(2), &Category::named("A"))
            .unwrap();
        history
            .add_duration(90., today - Duration::days(7), &Category::named("B"))
            .unwrap();

        let recent = history.recent_history(today, 7);
        assert_eq!(
            recent.iter().map(|v| v.date).collect::<Vec<_>>(),
            vec![today, today - Duration::days(1)]
        );
        assert_eq!(recent[1].total, 30.);

        assert_eq!(history.recent_history(today, 8).len(), 3);
        assert!(history.recent_history(today, 0).is_empty());
    }

    #[test]
    fn test_negative_durations_are_rejected() {
        let mut history = HistoryEntity::default();
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(history
            .add_duration(-1., today, &Category::Uncategorized)
            .is_err());
        assert!(history
            .add_duration(f64::NAN, today, &Category::Uncategorized)
            .is_err());
        assert!(history.days.is_empty());
    }

    #[test]
    fn test_presets() {
        let mut history = HistoryEntity::default();
        assert!(history.add_preset(" Writing ").unwrap());
        assert!(!history.add_preset("Writing").unwrap());
        assert!(history.add_preset("   ").is_err());
        assert_eq!(history.presets, vec!["Writing".to_string()]);
        assert!(history.remove_preset("Writing"));
        assert!(!history.remove_preset("Writing"));
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let history: HistoryEntity =
            serde_json::from_str(r#"{"days": {"2025-01-02": {"categories": {"A": 3.0}}}}"#)
                .unwrap();
        assert!(history.presets.is_empty());
        let day = &history.days["2025-01-02"];
        assert_eq!(day.uncategorized, 0.);
        assert_eq!(day.get(&Category::named("A")), 3.);
    }
}
