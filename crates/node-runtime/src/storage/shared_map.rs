//! In-memory [`AsyncKeyValueStore`] backed by a concurrent map.

use super::{AsyncKeyValueStore, StorageError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

/// Concurrent in-memory map shared between node instances.
#[derive(Debug, Default)]
pub struct SharedMap {
    name: String,
    data: DashMap<String, Value>,
}

impl SharedMap {
    /// Create an empty map.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: DashMap::new(),
        }
    }
}

#[async_trait]
impl AsyncKeyValueStore for SharedMap {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Value, StorageError> {
        self.data
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: Value) -> Result<(), StorageError> {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<Value, StorageError> {
        self.data
            .remove(key)
            .map(|(_, value)| value)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.data.clear();
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.contains_key(key))
    }

    async fn size(&self) -> Result<usize, StorageError> {
        Ok(self.data.len())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
