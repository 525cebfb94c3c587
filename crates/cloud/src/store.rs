//! Media storage abstraction.
//!
//! [`MediaStore`] is implemented by [`LocalStore`] (files under the
//! configured storage directory, served by `GET /api/v1/files/{key}`) and
//! by [`crate::s3::S3Storage`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use engui_core::naming;
use serde::Serialize;

/// URL prefix under which the API serves local files.
pub const FILES_URL_PREFIX: &str = "/api/v1/files/";

/// Errors from storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Required credentials or bucket settings are missing.
    #[error("Storage not configured: {0}")]
    NotConfigured(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    /// The key would escape the storage root or is otherwise malformed.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// The remote store rejected or failed the request.
    #[error("S3 request failed: {0}")]
    S3(String),

    #[error("Storage request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful [`MediaStore::put`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

/// A place generated and uploaded media can be written to.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError>;

    /// Remove the object under `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Stable URL under which the object is reachable.
    fn url_for(&self, key: &str) -> String;
}

/// Media store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path under the root, rejecting traversal.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !naming::is_safe_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    /// The key of a URL produced by [`LocalStore::url_for`], if it is one.
    pub fn key_for_url(url: &str) -> Option<&str> {
        url.strip_prefix(FILES_URL_PREFIX).filter(|k| !k.is_empty())
    }

    /// Read a stored object fully into memory.
    pub async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MediaStore for LocalStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len() as u64;
        // Write to a sibling temp file first so readers never see a partial file.
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(key, size, "Stored object on local disk");
        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{FILES_URL_PREFIX}{key}")
    }
}
