//! Key-value storage standing in for browser local/session storage.
//!
//! The identity store persists users here under the flow-context key
//! (`consumerUser`, `businessUser`, `enterpriseUser`), and the chat handoff
//! flag lives in a session-scoped instance.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::error::StorageError;

/// String key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every value.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory store. Lives as long as the process, like `sessionStorage`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        entries.clear();
        Ok(())
    }
}

/// JSON-file-backed store, like `localStorage` surviving a restart.
///
/// The whole map is rewritten on every mutation (write to a temp file, then
/// rename). Writes block the calling thread; async callers go through
/// `spawn_blocking`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened JSON store");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        entries.clear();
        self.flush(&entries)
    }
}
