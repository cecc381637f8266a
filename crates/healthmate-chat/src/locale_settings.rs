//! Persisted locale selection.

use std::sync::Arc;

use tracing::{info, warn};

use healthmate_core::locale::Locale;
use healthmate_core::services::PreferenceStore;

use crate::error::ChatError;

/// Preference key holding the selected locale key (`en`, `hi`, ...).
pub const PREFERRED_LANGUAGE_KEY: &str = "preferred_language";

/// Reads the locale once at startup and writes it on every change.
pub struct LocaleSettings {
    store: Arc<dyn PreferenceStore>,
    current: Locale,
}

impl LocaleSettings {
    /// Load the saved locale. Missing, unknown, or unreadable values fall
    /// back to English.
    pub fn load(store: Arc<dyn PreferenceStore>) -> Self {
        let current = match store.get(PREFERRED_LANGUAGE_KEY) {
            Ok(Some(saved)) => Locale::from_key(&saved).unwrap_or_else(|| {
                warn!(saved = %saved, "Unknown saved locale, using default");
                Locale::default()
            }),
            Ok(None) => Locale::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read saved locale, using default");
                Locale::default()
            }
        };
        info!(locale = %current, "Locale loaded");
        Self { store, current }
    }

    pub fn current(&self) -> Locale {
        self.current
    }

    /// Select and persist a locale.
    pub fn change(&mut self, locale: Locale) -> Result<(), ChatError> {
        self.store.set(PREFERRED_LANGUAGE_KEY, locale.key())?;
        self.current = locale;
        info!(locale = %locale, "Locale saved");
        Ok(())
    }
}
