//! File-backed key-value store for the persisted session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use escape_room_session::{KeyValueStore, StoreError};
use tracing::{debug, instrument, warn};

/// Stores string values in a single JSON object file.
///
/// A missing or unreadable file reads as an empty store, so the next write
/// replaces it. Parent directories are created on first write.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Creates a store backed by `path`. The file is not touched until used.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn new(path: impl AsRef<Path>) -> Self {
        debug!("Creating file session store");
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(StoreError::new(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&content) {
            Ok(values) => Ok(values),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::new(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(values)
            .map_err(|e| StoreError::new(format!("Failed to serialize store: {}", e)))?;
        std::fs::write(&self.path, content).map_err(|e| {
            StoreError::new(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl KeyValueStore for FileSessionStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.remove(key))
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read()?;
        values.insert(key.to_string(), value.to_string());
        self.write(&values)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read()?;
        if values.remove(key).is_some() {
            self.write(&values)?;
        }
        Ok(())
    }
}
