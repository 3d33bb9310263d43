//! Session records keyed by an opaque session key.

use std::{collections::HashMap, sync::Mutex};

use crate::BoxError;

/// The record a session store keeps per key.
///
/// A string-keyed JSON map, so fields owned by other parts of an application
/// pass through this crate untouched.
pub type SessionRecord = serde_json::Map<String, serde_json::Value>;

/// Key/value access to session records.
///
/// `read` followed by `write` is a plain read-modify-write. Stores are not
/// required to make the pair atomic; two writers racing on one key resolve
/// to last-write-wins.
pub trait SessionStore: Send + Sync {
    /// Reads the record under `key`. An unknown key yields an empty record.
    fn read(&self, key: &str) -> Result<SessionRecord, BoxError>;

    /// Stores `record` under `key` and returns the key it now lives under.
    fn write(&self, key: &str, record: SessionRecord) -> Result<String, BoxError>;
}

/// An in-memory [`SessionStore`] backed by a mutexed map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn read(&self, key: &str) -> Result<SessionRecord, BoxError> {
        let records = self.records.lock().map_err(|e| e.to_string())?;
        Ok(records.get(key).cloned().unwrap_or_default())
    }

    fn write(&self, key: &str, record: SessionRecord) -> Result<String, BoxError> {
        let mut records = self.records.lock().map_err(|e| e.to_string())?;
        records.insert(key.to_owned(), record);
        Ok(key.to_owned())
    }
}
