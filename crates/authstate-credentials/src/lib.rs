use std::sync::Arc;

use async_trait::async_trait;
use authstate_core::{
    credentials::{Credential, CredentialRegistry},
    storage::{load_json, store_json, KeyValueStore, StorageError},
};
use tracing::{debug, instrument, warn};

pub const CREDENTIALS_KEY: &str = "credentials";
pub const ACTIVE_CREDENTIAL_KEY: &str = "active_credential_id";

/// Credential registry backed by a `KeyValueStore` (plain or encrypted).
///
/// Every mutation rewrites the whole collection. Two writers in the same
/// process race and the last write wins.
pub struct CredentialStore<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    async fn load(&self) -> Result<Vec<Credential>, StorageError> {
        Ok(load_json(self.store.as_ref(), CREDENTIALS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, credentials: &[Credential]) -> Result<(), StorageError> {
        store_json(self.store.as_ref(), CREDENTIALS_KEY, credentials).await
    }
}

#[async_trait]
impl<S: KeyValueStore> CredentialRegistry for CredentialStore<S> {
    #[instrument(skip_all, fields(id = %credential.id))]
    async fn save_credential(&self, credential: Credential) -> Result<(), StorageError> {
        let mut credentials = self.load().await?;
        match credentials.iter_mut().find(|c| c.id == credential.id) {
            Some(existing) => *existing = credential,
            None => credentials.push(credential),
        }
        self.save(&credentials).await
    }

    #[instrument(skip(self))]
    async fn get_all_credentials(&self) -> Result<Vec<Credential>, StorageError> {
        self.load().await
    }

    #[instrument(skip(self))]
    async fn get_credential(&self, id: &str) -> Result<Option<Credential>, StorageError> {
        Ok(self.load().await?.into_iter().find(|c| c.id == id))
    }

    #[instrument(skip(self))]
    async fn remove_credential(&self, id: &str) -> Result<bool, StorageError> {
        let mut credentials = self.load().await?;
        let Some(index) = credentials.iter().position(|c| c.id == id) else {
            return Ok(false);
        };
        credentials.remove(index);
        self.save(&credentials).await?;

        if self.get_active_credential_id().await?.as_deref() == Some(id) {
            debug!("removed credential was active; clearing pointer");
            self.clear_active_credential().await?;
        }
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn set_active_credential(&self, id: &str) -> Result<(), StorageError> {
        store_json(self.store.as_ref(), ACTIVE_CREDENTIAL_KEY, id).await
    }

    async fn get_active_credential_id(&self) -> Result<Option<String>, StorageError> {
        load_json(self.store.as_ref(), ACTIVE_CREDENTIAL_KEY).await
    }

    async fn clear_active_credential(&self) -> Result<(), StorageError> {
        self.store.remove(ACTIVE_CREDENTIAL_KEY).await
    }

    #[instrument(skip(self))]
    async fn get_active_credential(&self) -> Result<Option<Credential>, StorageError> {
        let Some(id) = self.get_active_credential_id().await? else {
            return Ok(None);
        };
        let credential = self.get_credential(&id).await?;
        if credential.is_none() {
            warn!(%id, "active credential pointer is dangling");
        }
        Ok(credential)
    }

    async fn has_credentials(&self) -> Result<bool, StorageError> {
        Ok(!self.load().await?.is_empty())
    }

    #[instrument(skip(self))]
    async fn clear_all_credentials(&self) -> Result<(), StorageError> {
        self.store.remove(CREDENTIALS_KEY).await?;
        self.clear_active_credential().await
    }

    #[instrument(skip(self))]
    async fn record_credential_use(&self, id: &str, at_millis: i64) -> Result<bool, StorageError> {
        let mut credentials = self.load().await?;
        let Some(credential) = credentials.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        credential.last_used_at = Some(match credential.last_used_at {
            Some(previous) if previous > at_millis => previous,
            _ => at_millis,
        });
        self.save(&credentials).await?;
        Ok(true)
    }
}
