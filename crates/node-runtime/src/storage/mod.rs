//! # Storage
//!
//! Async key-value boundary used by nodes. Values are JSON so they can be
//! returned in replies unchanged.
//!
//! Testing and single-process deployments use [`SharedMap`]; every node in
//! the process that asks the context for the same map name shares one
//! instance.

pub mod shared_map;

pub use shared_map::SharedMap;

use async_trait::async_trait;
use serde_json::Value;
use shared_types::ResponseStatus;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No value for the key.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The key already holds a value.
    #[error("Key already exists: {0}")]
    Conflict(String),

    /// Backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Wire status for this error.
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::NotFound(_) => ResponseStatus::Missing,
            Self::Conflict(_) => ResponseStatus::Conflict,
            Self::Backend(_) => ResponseStatus::Error,
        }
    }
}

/// Async key-value store.
#[async_trait]
pub trait AsyncKeyValueStore: Send + Sync {
    /// Name of the store.
    fn name(&self) -> &str;

    /// Get a value.
    ///
    /// # Errors
    ///
    /// `StorageError::NotFound` when the key is absent.
    async fn get(&self, key: &str) -> Result<Value, StorageError>;

    /// Insert or replace a value.
    async fn put(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Insert only when the key is absent.
    ///
    /// # Errors
    ///
    /// `StorageError::Conflict` when the key already holds a value.
    async fn put_if_absent(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove a value.
    ///
    /// # Errors
    ///
    /// `StorageError::NotFound` when the key is absent.
    async fn remove(&self, key: &str) -> Result<Value, StorageError>;

    /// Remove every value.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Check if a key exists.
    async fn contains(&self, key: &str) -> Result<bool, StorageError>;

    /// Number of entries.
    async fn size(&self) -> Result<usize, StorageError>;

    /// Keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
