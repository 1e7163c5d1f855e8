//! User Preferences
//!
//! Theme, display currency and bookmarked causes. Each preference lives under
//! its own storage key and is saved as soon as it changes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Currency;
use crate::storage::{self, ClientStorage};

pub const THEME_KEY: &str = "causehive_theme";
pub const CURRENCY_KEY: &str = "causehive_currency";
pub const BOOKMARKS_KEY: &str = "bookmarked_causes";

/// Color theme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Persisted user preferences
pub struct Preferences {
    theme: Theme,
    currency: Currency,
    bookmarks: Vec<String>,
    storage: Arc<dyn ClientStorage>,
}

impl Preferences {
    /// Read preferences, falling back to defaults for anything unreadable
    pub fn load(storage: Arc<dyn ClientStorage>) -> Self {
        let theme = read_or_default(storage.as_ref(), THEME_KEY);
        let currency = read_or_default(storage.as_ref(), CURRENCY_KEY);
        let bookmarks = read_or_default(storage.as_ref(), BOOKMARKS_KEY);

        Self {
            theme,
            currency,
            bookmarks,
            storage,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn bookmarks(&self) -> &[String] {
        &self.bookmarks
    }

    pub fn is_bookmarked(&self, cause_id: &str) -> bool {
        self.bookmarks.iter().any(|id| id == cause_id)
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.theme = theme;
        storage::save_json(self.storage.as_ref(), THEME_KEY, &theme)
    }

    pub fn set_currency(&mut self, currency: Currency) -> Result<()> {
        self.currency = currency;
        storage::save_json(self.storage.as_ref(), CURRENCY_KEY, &currency)
    }

    /// Add or remove a bookmark; returns whether the cause is now bookmarked
    pub fn toggle_bookmark(&mut self, cause_id: &str) -> Result<bool> {
        let bookmarked = match self.bookmarks.iter().position(|id| id == cause_id) {
            Some(index) => {
                self.bookmarks.remove(index);
                false
            }
            None => {
                self.bookmarks.push(cause_id.to_string());
                true
            }
        };
        storage::save_json(self.storage.as_ref(), BOOKMARKS_KEY, &self.bookmarks)?;
        Ok(bookmarked)
    }

    pub fn clear_bookmarks(&mut self) -> Result<()> {
        self.bookmarks.clear();
        self.storage.remove(BOOKMARKS_KEY)
    }
}

fn read_or_default<T: serde::de::DeserializeOwned + Default>(storage: &dyn ClientStorage, key: &str) -> T {
    match storage::load_json(storage, key) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring unreadable preference");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_defaults_when_empty() {
        let prefs = Preferences::load(Arc::new(MemoryStorage::new()));
        assert_eq!(prefs.theme(), Theme::System);
        assert_eq!(prefs.currency(), Currency::Usd);
        assert!(prefs.bookmarks().is_empty());
    }

    #[test]
    fn test_preferences_persist() {
        let storage = Arc::new(MemoryStorage::new());
        let mut prefs = Preferences::load(storage.clone());
        prefs.set_theme(Theme::Dark).unwrap();
        prefs.set_currency(Currency::Ghs).unwrap();
        assert!(prefs.toggle_bookmark("3").unwrap());

        assert_eq!(storage.get(THEME_KEY).unwrap().as_deref(), Some("\"dark\""));

        let restored = Preferences::load(storage);
        assert_eq!(restored.theme(), Theme::Dark);
        assert_eq!(restored.currency(), Currency::Ghs);
        assert!(restored.is_bookmarked("3"));
    }

    #[test]
    fn test_toggle_bookmark_twice_removes() {
        let storage = Arc::new(MemoryStorage::new());
        let mut prefs = Preferences::load(storage.clone());
        assert!(prefs.toggle_bookmark("1").unwrap());
        assert!(!prefs.toggle_bookmark("1").unwrap());
        assert!(!prefs.is_bookmarked("1"));

        prefs.toggle_bookmark("2").unwrap();
        prefs.clear_bookmarks().unwrap();
        assert!(storage.get(BOOKMARKS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_value_falls_back() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(THEME_KEY, "not json").unwrap();
        let prefs = Preferences::load(storage);
        assert_eq!(prefs.theme(), Theme::System);
    }
}
