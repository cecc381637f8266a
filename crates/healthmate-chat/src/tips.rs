//! Daily health tip, stable for a whole calendar day.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use healthmate_core::services::PreferenceStore;

pub const DAILY_TIP_KEY: &str = "daily_tip";
pub const DAILY_TIP_DATE_KEY: &str = "daily_tip_date";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthTip {
    pub title: String,
    pub content: String,
}

const TIPS: [(&str, &str); 7] = [
    (
        "Stay Hydrated",
        "Drink at least 8 glasses of water daily to maintain proper hydration, especially in hot weather or when exercising.",
    ),
    (
        "Practice Mindful Eating",
        "Focus on your food, eat slowly, and enjoy each bite to improve digestion and prevent overeating.",
    ),
    (
        "Take Regular Breaks",
        "For every 30 minutes of screen time, take a 5-minute break to rest your eyes and move your body.",
    ),
    (
        "Sleep Matters",
        "Aim for 7-9 hours of quality sleep each night. Consistent sleep schedules improve overall health.",
    ),
    (
        "Daily Movement",
        "Even 30 minutes of moderate physical activity each day can significantly improve your health and mood.",
    ),
    (
        "Mind Your Posture",
        "Good posture reduces strain on your muscles and ligaments, preventing back pain and fatigue.",
    ),
    (
        "Wash Your Hands",
        "Regular handwashing with soap and water for at least 20 seconds helps prevent illness.",
    ),
];

/// All tips in catalog order.
pub fn catalog() -> Vec<HealthTip> {
    TIPS.iter()
        .map(|(title, content)| HealthTip {
            title: title.to_string(),
            content: content.to_string(),
        })
        .collect()
}

/// Picks one tip per day and remembers it in the preference store.
pub struct DailyTips {
    store: Arc<dyn PreferenceStore>,
}

impl DailyTips {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Today's tip in local time.
    pub fn today(&self) -> HealthTip {
        self.tip_for(Local::now().date_naive())
    }

    /// The tip for `date`. A tip cached for the same date wins; otherwise a
    /// new one is chosen and cached. Store failures only cost the cache.
    pub fn tip_for(&self, date: NaiveDate) -> HealthTip {
        let date_key = date.format("%Y-%m-%d").to_string();
        if let Some(cached) = self.cached(&date_key) {
            return cached;
        }

        let index = date.num_days_from_ce().rem_euclid(TIPS.len() as i32) as usize;
        let (title, content) = TIPS[index];
        let tip = HealthTip {
            title: title.to_string(),
            content: content.to_string(),
        };
        debug!(date = %date_key, title = %tip.title, "Selected daily tip");

        match serde_json::to_string(&tip) {
            Ok(json) => {
                let saved = self
                    .store
                    .set(DAILY_TIP_KEY, &json)
                    .and_then(|_| self.store.set(DAILY_TIP_DATE_KEY, &date_key));
                if let Err(e) = saved {
                    warn!(error = %e, "Failed to cache daily tip");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode daily tip"),
        }
        tip
    }

    fn cached(&self, date_key: &str) -> Option<HealthTip> {
        let saved_date = self.store.get(DAILY_TIP_DATE_KEY).ok().flatten()?;
        if saved_date != date_key {
            return None;
        }
        let raw = self.store.get(DAILY_TIP_KEY).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(tip) => Some(tip),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached tip");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthmate_core::error::HealthmateError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryPrefs {
        values: Mutex<HashMap<String, String>>,
    }

    impl PreferenceStore for MemoryPrefs {
        fn get(&self, key: &str) -> Result<Option<String>, HealthmateError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), HealthmateError> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_catalog_has_seven_tips() {
        let tips = catalog();
        assert_eq!(tips.len(), 7);
        assert_eq!(tips[0].title, "Stay Hydrated");
        assert_eq!(tips[6].title, "Wash Your Hands");
    }

    #[test]
    fn test_same_day_same_tip() {
        let tips = DailyTips::new(Arc::new(MemoryPrefs::default()));
        let day = date(2026, 3, 14);
        assert_eq!(tips.tip_for(day), tips.tip_for(day));
    }

    #[test]
    fn test_consecutive_days_rotate() {
        let tips = DailyTips::new(Arc::new(MemoryPrefs::default()));
        let first = tips.tip_for(date(2026, 3, 14));
        let second = tips.tip_for(date(2026, 3, 15));
        assert_ne!(first, second);
    }

    #[test]
    fn test_cached_tip_wins_for_its_date() {
        let prefs = Arc::new(MemoryPrefs::default());
        let custom = HealthTip {
            title: "Custom".to_string(),
            content: "Stretch.".to_string(),
        };
        prefs
            .set(DAILY_TIP_KEY, &serde_json::to_string(&custom).unwrap())
            .unwrap();
        prefs.set(DAILY_TIP_DATE_KEY, "2026-03-14").unwrap();

        let tips = DailyTips::new(prefs.clone());
        assert_eq!(tips.tip_for(date(2026, 3, 14)), custom);

        let next = tips.tip_for(date(2026, 3, 15));
        assert_ne!(next, custom);
        assert_eq!(
            prefs.get(DAILY_TIP_DATE_KEY).unwrap().as_deref(),
            Some("2026-03-15")
        );
    }

    #[test]
    fn test_corrupt_cache_is_replaced() {
        let prefs = Arc::new(MemoryPrefs::default());
        prefs.set(DAILY_TIP_KEY, "{not json").unwrap();
        prefs.set(DAILY_TIP_DATE_KEY, "2026-03-14").unwrap();

        let tip = DailyTips::new(prefs.clone()).tip_for(date(2026, 3, 14));
        assert!(catalog().contains(&tip));
        let stored: HealthTip =
            serde_json::from_str(&prefs.get(DAILY_TIP_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, tip);
    }
}
