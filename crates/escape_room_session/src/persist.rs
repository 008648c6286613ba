//! Persisted session value and the key-value store it is saved to.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::User;

/// Storage key under which the session is saved.
pub const SESSION_KEY: &str = "escape_room.session";

/// String key-value storage the session is saved to.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Store error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// The part of a session that survives a restart: the user identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct PersistedSession {
    user: Option<User>,
    saved_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    /// Creates a persisted session for a known user.
    pub fn new(user: Option<User>) -> Self {
        Self {
            user,
            saved_at: None,
        }
    }

    /// Loads the session from a store.
    ///
    /// A missing value yields an empty session. A value that does not parse
    /// is logged and also yields an empty session.
    #[instrument(skip(store))]
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let Some(raw) = store.get(SESSION_KEY)? else {
            debug!("No persisted session");
            return Ok(Self::default());
        };

        match serde_json::from_str::<Self>(&raw) {
            Ok(session) => {
                debug!(user_id = ?session.user.as_ref().map(|u| *u.id()), "Loaded persisted session");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable persisted session");
                Ok(Self::default())
            }
        }
    }

    /// Saves the session to a store, stamping the save time.
    #[instrument(skip(self, store))]
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let stamped = Self {
            user: self.user.clone(),
            saved_at: Some(Utc::now()),
        };
        let raw = serde_json::to_string(&stamped)
            .map_err(|e| StoreError::new(format!("Failed to serialize session: {}", e)))?;
        store.set(SESSION_KEY, &raw)?;
        debug!("Persisted session saved");
        Ok(())
    }

    /// Removes the saved session from a store.
    #[instrument(skip(store))]
    pub fn clear(store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.remove(SESSION_KEY)
    }
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values().remove(key);
        Ok(())
    }
}
