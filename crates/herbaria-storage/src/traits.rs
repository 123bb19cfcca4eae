//! Storage abstraction trait
//!
//! This module defines the `ObjectStorage` trait implemented by both backend
//! adapters. The router only ever talks to backends through it.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Primary write failed ({primary}) and fallback write failed ({secondary})")]
    FallbackFailed { primary: String, secondary: String },

    #[error("Integrity check failed for {key}: {reason}")]
    Integrity { key: String, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One stored object as reported by a backend listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

impl ObjectInfo {
    /// An object known only by its key.
    pub fn from_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }
}

/// Blob backend.
///
/// Keys are full object keys (see [`crate::keys`]); adapters never invent
/// keys of their own.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key`.
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cache_control: Option<&str>,
    ) -> StorageResult<()>;

    /// Remove the object stored under `key`.
    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// Fetch the object stored under `key`.
    async fn download_object(&self, key: &str) -> StorageResult<Bytes>;

    /// Permanent public URL for `key`.
    fn get_public_url(&self, key: &str) -> StorageResult<String>;

    /// Time-limited URL for `key`.
    ///
    /// Only the primary backend supports this; others return `Unsupported`.
    async fn get_signed_url(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        Err(StorageError::Unsupported(format!(
            "{} backend cannot sign URLs (key {})",
            self.backend_type(),
            key
        )))
    }

    /// Every object whose key starts with `prefix`, with the attributes the
    /// backend stored for it.
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        Err(StorageError::Unsupported(format!(
            "{} backend cannot list objects (prefix {:?})",
            self.backend_type(),
            prefix
        )))
    }

    /// True when URLs handed to clients must be signed rather than public.
    fn should_use_signed_urls(&self) -> bool {
        false
    }

    /// Role of this backend.
    fn backend_type(&self) -> StorageBackend;
}
