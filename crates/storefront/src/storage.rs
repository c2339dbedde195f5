//! Local persisted state (the device-side key/value store).
//!
//! Every store in the crate persists through [`LocalStore`]. Reads and writes
//! are synchronous and best-effort: a missing or corrupt value resets to the
//! default, and failures are logged rather than surfaced.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use vitrine_core::UserId;

/// Errors raised by a [`LocalStore`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Synchronous string key/value storage.
pub trait LocalStore: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`; deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Shared handle to a local store.
pub type SharedStore = Arc<dyn LocalStore>;

/// Namespaced storage keys. No two stores write the same key.
pub mod keys {
    use super::UserId;

    pub const CART: &str = "vitrine:cart";
    pub const COMPARE: &str = "vitrine:compare";
    pub const RECENT_SEARCHES: &str = "vitrine:recent-searches";
    pub const BROWSING_HISTORY: &str = "vitrine:browsing-history";
    pub const REVIEWS: &str = "vitrine:reviews";
    pub const THEME: &str = "vitrine:theme";
    pub const SESSION: &str = "vitrine:session";
    pub const PENDING_CHECKOUT: &str = "vitrine:checkout:pending";

    /// Per-user notification list.
    #[must_use]
    pub fn notifications(user_id: UserId) -> String {
        format!("vitrine:notifications:{user_id}")
    }

    /// Per-user favorites mirror.
    #[must_use]
    pub fn favorites(user_id: UserId) -> String {
        format!("vitrine:favorites:{user_id}")
    }
}

/// Read and decode `key`, falling back to `T::default()` on any failure.
pub fn load_or_default<T>(store: &dyn LocalStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Discarding unreadable stored value");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read local storage");
            T::default()
        }
    }
}

/// Encode and write `value` under `key`, logging failures.
pub fn save_best_effort<T>(store: &dyn LocalStore, key: &str, value: &T)
where
    T: Serialize + ?Sized,
{
    let result = serde_json::to_string(value)
        .map_err(StorageError::from)
        .and_then(|raw| store.set(key, &raw));
    if let Err(e) = result {
        tracing::warn!(key, error = %e, "Failed to write local storage");
    }
}

/// Delete `key`, logging failures.
pub fn remove_best_effort(store: &dyn LocalStore, key: &str) {
    if let Err(e) = store.remove(key) {
        tracing::warn!(key, error = %e, "Failed to remove local storage key");
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// Stores each key as a JSON file inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '.'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-process store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind a shared handle.
    #[must_use]
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}
