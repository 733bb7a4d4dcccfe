use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// Identity record for a registered authentication factor (e.g. a passkey).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Stable identifier issued by the external signing ceremony.
    pub id: String,
    /// Opaque encoded raw identifier.
    pub raw_id: String,
    /// Opaque encoded public key.
    pub public_key: String,
    /// COSE-style signed algorithm identifier (e.g. -7 for ES256).
    pub algorithm: i64,
    /// Epoch milliseconds.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Credential {
    pub fn new(
        id: impl Into<String>,
        raw_id: impl Into<String>,
        public_key: impl Into<String>,
        algorithm: i64,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            raw_id: raw_id.into(),
            public_key: public_key.into(),
            algorithm,
            created_at,
            last_used_at: None,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Registry of known credentials plus a single "active credential" pointer.
///
/// Referential anomalies are reported through `bool`/`Option` returns; only
/// storage failures surface as errors.
#[async_trait]
pub trait CredentialRegistry: Send + Sync {
    /// Upsert by id, keeping the position of an existing entry.
    async fn save_credential(&self, credential: Credential) -> Result<(), StorageError>;

    async fn get_all_credentials(&self) -> Result<Vec<Credential>, StorageError>;

    async fn get_credential(&self, id: &str) -> Result<Option<Credential>, StorageError>;

    /// Returns `false` when nothing matched. Clears the active pointer if it referenced `id`.
    async fn remove_credential(&self, id: &str) -> Result<bool, StorageError>;

    /// Does not check that `id` is registered.
    async fn set_active_credential(&self, id: &str) -> Result<(), StorageError>;

    async fn get_active_credential_id(&self) -> Result<Option<String>, StorageError>;

    async fn clear_active_credential(&self) -> Result<(), StorageError>;

    /// `None` when no pointer is set or the pointer is dangling.
    async fn get_active_credential(&self) -> Result<Option<Credential>, StorageError>;

    async fn has_credentials(&self) -> Result<bool, StorageError>;

    /// Drops the whole collection and the active pointer.
    async fn clear_all_credentials(&self) -> Result<(), StorageError>;

    /// Stamp `last_used_at`, never moving it backwards. Returns `false` for unknown ids.
    async fn record_credential_use(&self, id: &str, at_millis: i64) -> Result<bool, StorageError>;
}
