use std::{path::PathBuf, sync::Arc};

use crate::config::Config;
use authstate_storage::{
    AesGcmCrypto, EncryptedStore, FileStore, KeyringSecretProvider, SecretProvider, StaticSecret,
};
use color_eyre::Result;
use dirs::data_dir;
use tracing::debug;

/// Environment variable that overrides the keyring-held secret.
pub const SECRET_ENV: &str = "AUTHSTATE_SECRET";

/// Encrypted file store shared by the credential registry and session manager.
pub type AppStore = Arc<EncryptedStore<FileStore>>;

/// Resolve the default data directory.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("authstate"))
}

/// Build the encrypted store, honoring config overrides.
pub fn store_from_config(config: &Config) -> Result<AppStore> {
    let iterations = config.crypto.checked_iterations()?;
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    debug!(?root, "initializing encrypted store");
    Ok(build_store(root, secret_provider(), iterations))
}

fn secret_provider() -> Arc<dyn SecretProvider> {
    match std::env::var(SECRET_ENV) {
        Ok(secret) if !secret.is_empty() => {
            debug!("using secret from environment");
            Arc::new(StaticSecret::new(secret))
        }
        _ => Arc::new(KeyringSecretProvider::new("authstate", "data-secret")),
    }
}

fn build_store(
    root: PathBuf,
    secrets: impl SecretProvider + 'static,
    iterations: u32,
) -> AppStore {
    Arc::new(EncryptedStore::new(
        FileStore::new(root),
        AesGcmCrypto::with_iterations(iterations),
        secrets,
    ))
}

/// Helper for tests to construct a store rooted at a temp dir with an in-memory secret.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> AppStore {
    build_store(
        root.into(),
        authstate_storage::InMemorySecretProvider::default(),
        1_000,
    )
}
