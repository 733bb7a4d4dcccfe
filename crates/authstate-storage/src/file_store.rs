use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use authstate_core::storage::{KeyValueStore, StorageError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::instrument;

/// File-backed store: one JSON document per key under `root`.
/// Writes go through a temp file and an atomic rename. Pair with
/// [`crate::EncryptedStore`] to keep the documents encrypted.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    #[instrument(skip_all, fields(key))]
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        read_document(&self.path_for(key))
    }

    #[instrument(skip_all, fields(key))]
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(StorageError::backend)?;
        write_document(&self.path_for(key), &value)
    }

    #[instrument(skip_all, fields(key))]
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::backend(err)),
        }
    }

    #[instrument(skip_all)]
    async fn clear(&self) -> Result<(), StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(StorageError::backend(err)),
        };

        for entry in entries {
            let path = entry.map_err(StorageError::backend)?.path();
            if path.is_file() {
                match fs::remove_file(&path) {
                    Ok(_) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(StorageError::backend(err)),
                }
            }
        }
        Ok(())
    }
}

fn write_document(path: &Path, value: &Value) -> Result<(), StorageError> {
    let parent = path.parent().ok_or_else(|| StorageError::Backend {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(StorageError::backend)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(StorageError::backend)?;
    let json = serde_json::to_vec(value).map_err(StorageError::serialization)?;
    tmp.write_all(&json).map_err(StorageError::backend)?;
    tmp.flush().map_err(StorageError::backend)?;
    tmp.persist(path)
        .map_err(|e| StorageError::backend(e.error))?;
    Ok(())
}

fn read_document(path: &Path) -> Result<Option<Value>, StorageError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::backend(err)),
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(StorageError::backend)?;
    serde_json::from_slice(&buf)
        .map(Some)
        .map_err(StorageError::serialization)
}

fn sanitize_key(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key)
}
