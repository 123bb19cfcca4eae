//! In-memory backend for testing
//!
//! Stores objects in a process-local map and lets tests inject failures per
//! operation, so routing behavior can be exercised without a network.

use crate::keys::{join_public_url, validate_key};
use crate::traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const ALWAYS: u32 = u32::MAX;

/// One stored object with the attributes it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

#[derive(Debug)]
pub struct MemoryStorage {
    role: StorageBackend,
    objects: Mutex<HashMap<String, StoredObject>>,
    upload_failures: AtomicU32,
    fail_deletes: AtomicBool,
    fail_downloads: AtomicBool,
    fail_public_urls: AtomicBool,
    signed_urls: AtomicBool,
    fail_signing: AtomicBool,
    rejected_prefix: Mutex<Option<String>>,
    upload_attempts: AtomicU32,
    delete_attempts: AtomicU32,
}

impl MemoryStorage {
    pub fn new(role: StorageBackend) -> Self {
        Self {
            role,
            objects: Mutex::new(HashMap::new()),
            upload_failures: AtomicU32::new(0),
            fail_deletes: AtomicBool::new(false),
            fail_downloads: AtomicBool::new(false),
            fail_public_urls: AtomicBool::new(false),
            signed_urls: AtomicBool::new(false),
            fail_signing: AtomicBool::new(false),
            rejected_prefix: Mutex::new(None),
            upload_attempts: AtomicU32::new(0),
            delete_attempts: AtomicU32::new(0),
        }
    }

    pub fn primary() -> Self {
        Self::new(StorageBackend::Primary)
    }

    pub fn secondary() -> Self {
        Self::new(StorageBackend::Secondary)
    }

    /// Fail the next `n` uploads, then succeed.
    pub fn fail_next_uploads(&self, n: u32) {
        self.upload_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_all_uploads(&self) {
        self.upload_failures.store(ALWAYS, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_public_urls(&self, fail: bool) {
        self.fail_public_urls.store(fail, Ordering::SeqCst);
    }

    /// Report that clients need signed URLs (no public base).
    pub fn set_signed_urls(&self, signed: bool) {
        self.signed_urls.store(signed, Ordering::SeqCst);
    }

    /// Fail every signing request.
    pub fn set_fail_signing(&self, fail: bool) {
        self.fail_signing.store(fail, Ordering::SeqCst);
    }

    /// Reject every upload whose key starts with `prefix`.
    pub fn reject_uploads_with_prefix(&self, prefix: &str) {
        *self.rejected_prefix.lock().unwrap() = Some(prefix.to_string());
    }

    /// Public base URL used by this backend: `https://{role}.test`.
    pub fn public_base_url(&self) -> String {
        format!("https://{}.test", self.role)
    }

    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: None,
                cache_control: None,
            },
        );
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn get_object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn upload_attempts(&self) -> u32 {
        self.upload_attempts.load(Ordering::SeqCst)
    }

    pub fn delete_attempts(&self) -> u32 {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    fn take_upload_failure(&self) -> bool {
        self.upload_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                match remaining {
                    0 => None,
                    ALWAYS => Some(ALWAYS),
                    n => Some(n - 1),
                }
            })
            .is_ok()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        validate_key(key)?;
        let attempt = self.upload_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let rejected = self
            .rejected_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix));
        if rejected || self.take_upload_failure() {
            return Err(StorageError::UploadFailed(format!(
                "{} upload attempt {} failed",
                self.role, attempt
            )));
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(String::from),
                cache_control: cache_control.map(String::from),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!(
                "{} delete failed",
                self.role
            )));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn download_object(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(StorageError::DownloadFailed(format!(
                "{} download failed",
                self.role
            )));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let prefix = prefix.trim_start_matches('/');
        let objects = self.objects.lock().unwrap();
        let mut listed: Vec<ObjectInfo> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                size_bytes: Some(object.data.len() as u64),
                content_type: object.content_type.clone(),
                cache_control: object.cache_control.clone(),
            })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    fn get_public_url(&self, key: &str) -> StorageResult<String> {
        if self.fail_public_urls.load(Ordering::SeqCst) {
            return Err(StorageError::ConfigError(format!(
                "{} public URL unavailable",
                self.role
            )));
        }
        Ok(join_public_url(&self.public_base_url(), key))
    }

    async fn get_signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if !self.signed_urls.load(Ordering::SeqCst) {
            return Err(StorageError::Unsupported("signing disabled".to_string()));
        }
        if self.fail_signing.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError(format!(
                "{} signing failed",
                self.role
            )));
        }
        Ok(format!(
            "{}?expires={}",
            join_public_url(&self.public_base_url(), key),
            expires_in.as_secs()
        ))
    }

    fn should_use_signed_urls(&self) -> bool {
        self.signed_urls.load(Ordering::SeqCst)
    }

    fn backend_type(&self) -> StorageBackend {
        self.role
    }
}
