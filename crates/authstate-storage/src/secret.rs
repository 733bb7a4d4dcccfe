use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Length of generated secrets before encoding.
const GENERATED_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("secret unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the secret that encryption keys are derived from.
///
/// Called once per encrypted read or write. The value may change between
/// sessions (e.g. after rotation), which makes older records unreadable.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn secret(&self) -> Result<String, SecretError>;
}

#[async_trait]
impl<T: SecretProvider + ?Sized> SecretProvider for Arc<T> {
    async fn secret(&self) -> Result<String, SecretError> {
        (**self).secret().await
    }
}

/// Fixed secret, typically supplied through the environment.
#[derive(Clone)]
pub struct StaticSecret(String);

impl StaticSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }
}

impl std::fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticSecret(..)")
    }
}

#[async_trait]
impl SecretProvider for StaticSecret {
    async fn secret(&self) -> Result<String, SecretError> {
        Ok(self.0.clone())
    }
}

/// OS keyring-backed provider. Generates and stores a random secret on first use.
pub struct KeyringSecretProvider {
    service: String,
    account: String,
}

impl KeyringSecretProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

#[async_trait]
impl SecretProvider for KeyringSecretProvider {
    async fn secret(&self) -> Result<String, SecretError> {
        // Keyring operations are synchronous; wrap in async for trait compatibility.
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| SecretError::Keyring(e.to_string()))?;

        if let Some(secret) = stored_secret(entry.get_password())? {
            return Ok(secret);
        }

        let secret = generate_secret()?;
        entry
            .set_password(&secret)
            .map_err(|e| SecretError::Keyring(e.to_string()))?;
        Ok(secret)
    }
}

/// Only a missing entry allows generating a new secret; other keyring
/// failures propagate and leave the stored secret untouched.
fn stored_secret(lookup: Result<String, keyring::Error>) -> Result<Option<String>, SecretError> {
    match lookup {
        Ok(secret) => Ok(Some(secret)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(SecretError::Keyring(err.to_string())),
    }
}

/// In-memory provider for tests and ephemeral runs. Lazily generates a secret
/// and allows replacing it to simulate rotation.
#[derive(Default, Clone)]
pub struct InMemorySecretProvider {
    inner: Arc<Mutex<Option<String>>>,
}

impl InMemorySecretProvider {
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(secret.into()))),
        }
    }

    /// Replace the current secret. Records written under the old one stop decrypting.
    pub fn rotate(&self, secret: impl Into<String>) -> Result<(), SecretError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| SecretError::Unavailable(format!("lock poisoned: {err}")))?;
        *guard = Some(secret.into());
        Ok(())
    }
}

#[async_trait]
impl SecretProvider for InMemorySecretProvider {
    async fn secret(&self) -> Result<String, SecretError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| SecretError::Unavailable(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let secret = generate_secret()?;
        *guard = Some(secret.clone());
        Ok(secret)
    }
}

fn generate_secret() -> Result<String, SecretError> {
    let mut bytes = [0u8; GENERATED_SECRET_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SecretError::Unavailable(e.to_string()))?;
    Ok(general_purpose::STANDARD.encode(bytes))
}
