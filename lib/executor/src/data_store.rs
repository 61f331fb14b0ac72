//! Keyed cross-run state ("data store" nodes).
//!
//! Workflows read and write small keyed JSON values that outlive a single
//! run. Keys are scoped per workflow by default; the global scope is
//! shared. Storage is behind a trait: in-memory here, Postgres in the
//! server.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Errors from data store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStoreError {
    /// Storage backend failed.
    StorageFailed { reason: String },
    /// Append target exists but is not an array.
    NotAnArray { key: String },
}

impl fmt::Display for DataStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { reason } => write!(f, "data store failed: {reason}"),
            Self::NotAnArray { key } => {
                write!(f, "cannot append: value under '{key}' is not an array")
            }
        }
    }
}

impl std::error::Error for DataStoreError {}

/// Trait for keyed JSON storage.
///
/// `scope` is an opaque namespace string (the workflow ID, or "global").
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Reads the value under a key; `None` when absent.
    async fn get(&self, scope: &str, key: &str) -> Result<Option<JsonValue>, DataStoreError>;

    /// Writes the value under a key, replacing any previous value.
    async fn set(&self, scope: &str, key: &str, value: JsonValue) -> Result<(), DataStoreError>;

    /// Removes a key. Returns true when a value was present.
    async fn delete(&self, scope: &str, key: &str) -> Result<bool, DataStoreError>;

    /// Appends a value to the array under a key, creating the array when
    /// absent. Returns the new length.
    async fn append(&self, scope: &str, key: &str, value: JsonValue)
    -> Result<usize, DataStoreError>;
}

/// In-memory data store for tests and single-node deployments.
#[derive(Default)]
pub struct InMemoryDataStore {
    entries: Mutex<HashMap<(String, String), JsonValue>>,
}

impl InMemoryDataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(scope: &str, key: &str) -> (String, String) {
        (scope.to_string(), key.to_string())
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<JsonValue>, DataStoreError> {
        Ok(self
            .entries
            .lock()
            .expect("data store lock")
            .get(&Self::key(scope, key))
            .cloned())
    }

    async fn set(&self, scope: &str, key: &str, value: JsonValue) -> Result<(), DataStoreError> {
        self.entries
            .lock()
            .expect("data store lock")
            .insert(Self::key(scope, key), value);
        Ok(())
    }

    async fn delete(&self, scope: &str, key: &str) -> Result<bool, DataStoreError> {
        Ok(self
            .entries
            .lock()
            .expect("data store lock")
            .remove(&Self::key(scope, key))
            .is_some())
    }

    async fn append(
        &self,
        scope: &str,
        key: &str,
        value: JsonValue,
    ) -> Result<usize, DataStoreError> {
        let mut entries = self.entries.lock().expect("data store lock");
        let entry = entries
            .entry(Self::key(scope, key))
            .or_insert_with(|| JsonValue::Array(Vec::new()));

        let JsonValue::Array(items) = entry else {
            return Err(DataStoreError::NotAnArray {
                key: key.to_string(),
            });
        };
        items.push(value);
        Ok(items.len())
    }
}
