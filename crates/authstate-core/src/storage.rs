use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced by key/value storage implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying medium failure (I/O, poisoned lock, remote store).
    #[error("storage failure: {reason}")]
    Backend { reason: String },
    /// A value could not be converted to or from its persisted form.
    #[error("serialization failure: {reason}")]
    Serialization { reason: String },
    /// A value could not be encrypted before being written.
    #[error("encryption failure: {reason}")]
    Encryption { reason: String },
    /// The secret used for encryption at rest could not be obtained.
    #[error("secret unavailable: {reason}")]
    Secret { reason: String },
}

impl StorageError {
    pub fn backend<E: ToString>(err: E) -> Self {
        Self::Backend {
            reason: err.to_string(),
        }
    }

    pub fn serialization<E: ToString>(err: E) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Narrow key/value contract every component persists through.
/// Implementations know the physical medium; callers never do.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, or `None` when nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Persist a value under a key, overwriting any existing entry.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove a key and its value (idempotent).
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key held by this store.
    async fn clear(&self) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        (**self).clear().await
    }
}

/// Read a typed record. A stored value of the wrong shape is a serialization error.
pub async fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(StorageError::serialization),
        None => Ok(None),
    }
}

/// Write a typed record.
pub async fn store_json<T, S>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let value = serde_json::to_value(value).map_err(StorageError::serialization)?;
    store.set(key, value).await
}

/// In-memory store for tests and ephemeral runs. Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<HashMap<String, Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let map = self.inner.lock().map_err(|err| StorageError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut map = self.inner.lock().map_err(|err| StorageError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.inner.lock().map_err(|err| StorageError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut map = self.inner.lock().map_err(|err| StorageError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.clear();
        Ok(())
    }
}
