//! Concrete storage implementations and encryption at rest.
//! Uses AES-256-GCM with keys derived by PBKDF2-HMAC-SHA256 from a secret
//! sourced from the OS keyring (or test doubles).

pub mod crypto;
pub mod encrypted_store;
pub mod file_store;
pub mod secret;

pub use crypto::{AesGcmCrypto, CryptoAdapter, CryptoError, EncryptedRecord};
pub use encrypted_store::EncryptedStore;
pub use file_store::FileStore;
pub use secret::{
    InMemorySecretProvider, KeyringSecretProvider, SecretError, SecretProvider, StaticSecret,
};
