use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Salt length in bytes for key derivation.
pub const SALT_LEN: usize = 16;
/// AES-GCM nonce length in bytes (96 bits).
pub const IV_LEN: usize = 12;
/// Derived key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;
/// Default PBKDF2-HMAC-SHA256 work factor.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Ciphertext plus the per-write material needed to decrypt it.
/// Every field is standard base64.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("secure random source failed: {0}")]
    Random(String),
    #[error("encryption failed")]
    Encryption,
    /// Wrong secret, tampering and malformed input all map here.
    #[error("decryption failed")]
    Decryption,
}

/// Symmetric authenticated encryption keyed by a caller-supplied secret.
pub trait CryptoAdapter: Send + Sync {
    /// Encrypt under a key derived from `secret` and a fresh random salt, with a fresh random IV.
    fn encrypt(&self, plaintext: &[u8], secret: &str) -> Result<EncryptedRecord, CryptoError>;

    /// Re-derive the key from the record's salt and authenticate-decrypt.
    fn decrypt(&self, record: &EncryptedRecord, secret: &str) -> Result<Vec<u8>, CryptoError>;

    /// `n` bytes from the operating system CSPRNG.
    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, CryptoError>;
}

/// AES-256-GCM with PBKDF2-HMAC-SHA256 key derivation.
#[derive(Debug, Clone)]
pub struct AesGcmCrypto {
    iterations: u32,
}

impl Default for AesGcmCrypto {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl AesGcmCrypto {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the PBKDF2 work factor (at least one round).
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn derive_key(&self, secret: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, self.iterations, &mut key[..]);
        key
    }

    fn cipher(&self, secret: &str, salt: &[u8]) -> Result<Aes256Gcm, CryptoError> {
        let key = self.derive_key(secret, salt);
        // Infallible for a 32-byte key.
        Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::Encryption)
    }
}

impl CryptoAdapter for AesGcmCrypto {
    fn encrypt(&self, plaintext: &[u8], secret: &str) -> Result<EncryptedRecord, CryptoError> {
        let salt = self.random_bytes(SALT_LEN)?;
        let iv = self.random_bytes(IV_LEN)?;

        let cipher = self.cipher(secret, &salt)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| CryptoError::Encryption)?;

        Ok(EncryptedRecord {
            ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(iv),
            salt: STANDARD.encode(salt),
        })
    }

    fn decrypt(&self, record: &EncryptedRecord, secret: &str) -> Result<Vec<u8>, CryptoError> {
        let salt = STANDARD
            .decode(&record.salt)
            .map_err(|_| CryptoError::Decryption)?;
        let iv = STANDARD
            .decode(&record.iv)
            .map_err(|_| CryptoError::Decryption)?;
        let ciphertext = STANDARD
            .decode(&record.ciphertext)
            .map_err(|_| CryptoError::Decryption)?;

        if iv.len() != IV_LEN || salt.is_empty() {
            return Err(CryptoError::Decryption);
        }

        let cipher = self
            .cipher(secret, &salt)
            .map_err(|_| CryptoError::Decryption)?;
        cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|_| CryptoError::Decryption)
    }

    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = vec![0u8; n];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::Random(e.to_string()))?;
        Ok(bytes)
    }
}
