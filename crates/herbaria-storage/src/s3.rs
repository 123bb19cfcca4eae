use crate::keys::{join_public_url, normalize_base_url, validate_key};
use crate::traits::{ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use herbaria_core::PrimaryBackendConfig;
use http::Method;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::sync::Arc;
use std::time::Duration;

/// Primary backend: S3-compatible object storage (Cloudflare R2 by default).
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn object_store::ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    bucket: String,
    public_base_url: Option<String>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Every credential must be present; there is no partially configured
    /// adapter. The endpoint is the explicit override when given, otherwise the
    /// R2 endpoint derived from the account id.
    pub fn new(config: &PrimaryBackendConfig, request_timeout: Duration) -> StorageResult<Self> {
        let endpoint = config.endpoint_url().ok_or_else(|| {
            StorageError::ConfigError("R2_ACCOUNT_ID or R2_ENDPOINT not configured".to_string())
        })?;
        for (name, value) in [
            ("R2_ACCESS_KEY_ID", &config.access_key_id),
            ("R2_SECRET_ACCESS_KEY", &config.secret_access_key),
            ("R2_BUCKET", &config.bucket),
        ] {
            if value.trim().is_empty() {
                return Err(StorageError::ConfigError(format!("{} not configured", name)));
            }
        }

        let allow_http = endpoint.starts_with("http://");
        let s3 = AmazonS3Builder::new()
            .with_endpoint(endpoint.clone())
            .with_allow_http(allow_http)
            .with_region("auto")
            .with_bucket_name(config.bucket.clone())
            .with_access_key_id(config.access_key_id.clone())
            .with_secret_access_key(config.secret_access_key.clone())
            .with_client_options(ClientOptions::new().with_timeout(request_timeout))
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        tracing::debug!(
            bucket = %config.bucket,
            endpoint = %endpoint,
            public_base_url = ?config.public_base_url,
            timeout_secs = request_timeout.as_secs(),
            "S3 storage configured"
        );

        let s3 = Arc::new(s3);
        let signer: Arc<dyn Signer> = s3.clone();
        Ok(S3Storage {
            store: s3,
            signer: Some(signer),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.as_deref().map(normalize_base_url),
        })
    }

    /// Wrap an arbitrary object store (in-memory, local) without URL signing.
    pub fn with_store(
        store: Arc<dyn object_store::ObjectStore>,
        bucket: impl Into<String>,
        public_base_url: Option<&str>,
    ) -> Self {
        S3Storage {
            store,
            signer: None,
            bucket: bucket.into(),
            public_base_url: public_base_url.map(normalize_base_url),
        }
    }

    fn put_options(content_type: Option<&str>, cache_control: Option<&str>) -> PutOptions {
        let mut attributes = Attributes::new();
        if let Some(content_type) = content_type {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        if let Some(cache_control) = cache_control {
            attributes.insert(Attribute::CacheControl, cache_control.to_string().into());
        }
        PutOptions {
            attributes,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        validate_key(key)?;
        let size = data.len() as u64;
        let location = Path::from(key);
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put_opts(
                &location,
                PutPayload::from(data),
                Self::put_options(content_type, cache_control),
            )
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            content_type = ?content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let start = std::time::Instant::now();
        let location = Path::from(key);

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn download_object(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        let start = std::time::Instant::now();
        let location = Path::from(key);

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes)
    }

    fn get_public_url(&self, key: &str) -> StorageResult<String> {
        let base = self.public_base_url.as_deref().ok_or_else(|| {
            StorageError::ConfigError(
                "R2_PUBLIC_BASE_URL not configured; required for public URLs".to_string(),
            )
        })?;
        Ok(join_public_url(base, key))
    }

    async fn get_signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            StorageError::Unsupported("URL signing not available for this store".to_string())
        })?;
        let location = Path::from(key);

        let url_result: ObjectResult<_> = signer
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(url)
    }

    fn should_use_signed_urls(&self) -> bool {
        self.public_base_url.is_none()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Primary
    }
}
