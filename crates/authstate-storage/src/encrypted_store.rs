use std::sync::Arc;

use async_trait::async_trait;
use authstate_core::storage::{KeyValueStore, StorageError};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::{
    crypto::{CryptoAdapter, EncryptedRecord},
    secret::SecretProvider,
};

/// Transparent encryption at rest over any `KeyValueStore`.
///
/// Each `set` stores an [`EncryptedRecord`] with fresh salt and IV. Reads fail
/// closed: a record that cannot be decrypted or parsed for *any* reason
/// (wrong or rotated secret, corruption, tampering, foreign data) reads as
/// `None`, exactly like a key that was never written. This is deliberate;
/// callers cannot tell "key rotated" from "record damaged". Only failures of
/// the inner store or of the secret provider are returned as errors.
pub struct EncryptedStore<S: KeyValueStore> {
    inner: S,
    crypto: Arc<dyn CryptoAdapter>,
    secrets: Arc<dyn SecretProvider>,
}

impl<S: KeyValueStore> EncryptedStore<S> {
    pub fn new(
        inner: S,
        crypto: impl CryptoAdapter + 'static,
        secrets: impl SecretProvider + 'static,
    ) -> Self {
        Self {
            inner,
            crypto: Arc::new(crypto),
            secrets: Arc::new(secrets),
        }
    }

    /// The wrapped store, which only ever sees encrypted records.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn current_secret(&self) -> Result<String, StorageError> {
        self.secrets
            .secret()
            .await
            .map_err(|e| StorageError::Secret {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for EncryptedStore<S> {
    #[instrument(skip_all, fields(key))]
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let Some(stored) = self.inner.get(key).await? else {
            return Ok(None);
        };

        let record: EncryptedRecord = match serde_json::from_value(stored) {
            Ok(record) => record,
            Err(_) => {
                warn!(key, "stored value is not an encrypted record; treating as absent");
                return Ok(None);
            }
        };

        let secret = self.current_secret().await?;
        let plaintext = match self.crypto.decrypt(&record, &secret) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                warn!(key, "encrypted record could not be decrypted; treating as absent");
                return Ok(None);
            }
        };

        match serde_json::from_slice(&plaintext) {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                warn!(key, "decrypted payload is not valid JSON; treating as absent");
                Ok(None)
            }
        }
    }

    #[instrument(skip_all, fields(key))]
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let plaintext = serde_json::to_vec(&value).map_err(StorageError::serialization)?;
        let secret = self.current_secret().await?;
        let record = self
            .crypto
            .encrypt(&plaintext, &secret)
            .map_err(|e| StorageError::Encryption {
                reason: e.to_string(),
            })?;
        let stored = serde_json::to_value(record).map_err(StorageError::serialization)?;
        self.inner.set(key, stored).await
    }

    #[instrument(skip_all, fields(key))]
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }

    #[instrument(skip_all)]
    async fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear().await
    }
}
