//! Recent searches, browsing history and theme preference.

use serde::{Deserialize, Serialize};

use vitrine_core::ProductId;

use crate::storage::{self, SharedStore, keys};

/// Recent searches kept.
pub const MAX_RECENT_SEARCHES: usize = 10;

/// Viewed products kept.
pub const MAX_BROWSING_HISTORY: usize = 20;

/// Search terms, most recent first.
pub struct RecentSearches {
    entries: Vec<String>,
    store: SharedStore,
}

impl RecentSearches {
    #[must_use]
    pub fn load(store: SharedStore) -> Self {
        let mut entries: Vec<String> =
            storage::load_or_default(store.as_ref(), keys::RECENT_SEARCHES);
        entries.truncate(MAX_RECENT_SEARCHES);
        Self { entries, store }
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Move `term` to the front; blank terms are ignored.
    pub fn record(&mut self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        let lower = term.to_lowercase();
        self.entries.retain(|e| e.to_lowercase() != lower);
        self.entries.insert(0, term.to_string());
        self.entries.truncate(MAX_RECENT_SEARCHES);
        storage::save_best_effort(self.store.as_ref(), keys::RECENT_SEARCHES, &self.entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        storage::remove_best_effort(self.store.as_ref(), keys::RECENT_SEARCHES);
    }
}

/// Viewed products, most recent first.
pub struct BrowsingHistory {
    entries: Vec<ProductId>,
    store: SharedStore,
}

impl BrowsingHistory {
    #[must_use]
    pub fn load(store: SharedStore) -> Self {
        let mut entries: Vec<ProductId> =
            storage::load_or_default(store.as_ref(), keys::BROWSING_HISTORY);
        entries.truncate(MAX_BROWSING_HISTORY);
        Self { entries, store }
    }

    #[must_use]
    pub fn entries(&self) -> &[ProductId] {
        &self.entries
    }

    pub fn record(&mut self, product_id: ProductId) {
        self.entries.retain(|id| *id != product_id);
        self.entries.insert(0, product_id);
        self.entries.truncate(MAX_BROWSING_HISTORY);
        storage::save_best_effort(self.store.as_ref(), keys::BROWSING_HISTORY, &self.entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        storage::remove_best_effort(self.store.as_ref(), keys::BROWSING_HISTORY);
    }
}

/// Color scheme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(format!("invalid theme: {other}")),
        }
    }
}

/// Stored theme, [`Theme::System`] when unset.
#[must_use]
pub fn load_theme(store: &SharedStore) -> Theme {
    storage::load_or_default(store.as_ref(), keys::THEME)
}

pub fn save_theme(store: &SharedStore, theme: Theme) {
    storage::save_best_effort(store.as_ref(), keys::THEME, &theme);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_recent_searches_dedup_and_cap() {
        let store = MemoryStore::shared();
        let mut searches = RecentSearches::load(store.clone());
        for i in 0..12 {
            searches.record(&format!("termo {i}"));
        }
        searches.record("  ");
        searches.record("TERMO 5");

        assert_eq!(searches.entries().len(), MAX_RECENT_SEARCHES);
        assert_eq!(searches.entries()[0], "TERMO 5");
        assert_eq!(
            searches
                .entries()
                .iter()
                .filter(|e| e.eq_ignore_ascii_case("termo 5"))
                .count(),
            1
        );
        assert_eq!(RecentSearches::load(store).entries(), searches.entries());
    }

    #[test]
    fn test_browsing_history_cap() {
        let store = MemoryStore::shared();
        let mut history = BrowsingHistory::load(store.clone());
        let first = ProductId::generate();
        history.record(first);
        for _ in 0..MAX_BROWSING_HISTORY {
            history.record(ProductId::generate());
        }
        assert_eq!(history.entries().len(), MAX_BROWSING_HISTORY);
        assert!(!history.entries().contains(&first));

        let again = history.entries()[5];
        history.record(again);
        assert_eq!(history.entries()[0], again);
        assert_eq!(history.entries().len(), MAX_BROWSING_HISTORY);

        history.clear();
        assert!(BrowsingHistory::load(store).entries().is_empty());
    }

    #[test]
    fn test_theme_defaults_to_system() {
        let store = MemoryStore::shared();
        assert_eq!(load_theme(&store), Theme::System);
        save_theme(&store, Theme::Dark);
        assert_eq!(load_theme(&store), Theme::Dark);
        assert_eq!("LIGHT".parse::<Theme>(), Ok(Theme::Light));
    }
}
