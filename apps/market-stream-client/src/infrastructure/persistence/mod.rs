//! Key/Value Store Adapters
//!
//! Implementations of the `KeyValueStore` port.
//!
//! - `MemoryStore`: shared in-process map, used by tests and ephemeral runs
//! - `FileStore`: a single JSON object on disk, rewritten atomically on
//!   every change
//!
//! Both swallow their own failures as the port requires; `FileStore` logs
//! them.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::application::ports::KeyValueStore;

/// File store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file did not hold a JSON object of strings.
    #[error("malformed store file: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.lock().remove(key);
    }
}

// =============================================================================
// File Store
// =============================================================================

/// JSON-file-backed store.
///
/// The whole file is loaded at open and rewritten on every change through a
/// temporary sibling file and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file opens empty. An unreadable or malformed file is logged
    /// and also opens empty; it is replaced on the next write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable store file");
                BTreeMap::new()
            }
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened file store");
        Self { path, entries }
    }

    /// Get the file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn flush(&self) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, content).map_err(io_err)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    fn flush_logged(&self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to write store file");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush_logged();
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.flush_logged();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clones_share_state() {
        let mut store = MemoryStore::new();
        let observer = store.clone();

        store.set("a", "1");
        assert_eq!(observer.get("a").as_deref(), Some("1"));

        store.remove("a");
        assert!(observer.is_empty());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = FileStore::open(&path);
        store.set("stream.loggedIn", "true");
        store.set("stream.subscriptions", "[]");
        store.remove("stream.subscriptions");

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("stream.loggedIn").as_deref(), Some("true"));
        assert!(reopened.get("stream.subscriptions").is_none());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("absent.json"));
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn file_store_malformed_file_is_empty_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut store = FileStore::open(&path);
        assert!(store.get("stream.loggedIn").is_none());

        store.set("stream.loggedIn", "false");
        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("stream.loggedIn").as_deref(), Some("false"));
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = FileStore::open(&path);
        store.set("k", "v");

        assert!(path.exists());
    }
}
