//! Storage router
//!
//! Routes object operations between the primary and secondary backends.
//! Writes go to the primary with bounded retries; the secondary absorbs
//! failed writes and reads when fallback is enabled, and optionally mirrors
//! every successful write. Secondary side effects never fail a call.

use crate::keys::{key_from_public_url, validate_key};
use crate::metrics::{MetricEvent, MetricSink, StorageMetric, TracingMetricSink};
use crate::traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use bytes::Bytes;
use herbaria_core::constants::CACHE_CONTROL_IMMUTABLE;
use herbaria_core::StorageConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Routing switches, taken from [`StorageConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub read_source: StorageBackend,
    pub dual_write_secondary: bool,
    pub fallback_to_secondary: bool,
    pub primary_write_retries: u32,
    pub primary_retry_backoff: Duration,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            read_source: StorageBackend::Primary,
            dual_write_secondary: false,
            fallback_to_secondary: true,
            primary_write_retries: 1,
            primary_retry_backoff: Duration::ZERO,
        }
    }
}

impl From<&StorageConfig> for RoutingPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            read_source: config.read_source,
            dual_write_secondary: config.dual_write_secondary,
            fallback_to_secondary: config.fallback_to_secondary,
            primary_write_retries: config.primary_write_retries,
            primary_retry_backoff: config.primary_retry_backoff,
        }
    }
}

impl RoutingPolicy {
    pub fn primary_write_attempts(&self) -> u32 {
        self.primary_write_retries.saturating_add(1)
    }

    /// Pause before the attempt following `attempt`: linear, saturating.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.primary_retry_backoff.saturating_mul(attempt)
    }
}

/// Result of copying one object from the secondary to the primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedObject {
    pub key: String,
    pub size_bytes: u64,
}

#[derive(Clone)]
pub struct StorageRouter {
    primary: Arc<dyn ObjectStorage>,
    secondary: Arc<dyn ObjectStorage>,
    policy: RoutingPolicy,
    metrics: Arc<dyn MetricSink>,
}

impl StorageRouter {
    pub fn new(
        primary: Arc<dyn ObjectStorage>,
        secondary: Arc<dyn ObjectStorage>,
        policy: RoutingPolicy,
    ) -> Self {
        Self {
            primary,
            secondary,
            policy,
            metrics: Arc::new(TracingMetricSink),
        }
    }

    /// Replace the metric sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    pub fn primary(&self) -> &Arc<dyn ObjectStorage> {
        &self.primary
    }

    pub fn secondary(&self) -> &Arc<dyn ObjectStorage> {
        &self.secondary
    }

    /// Store an object.
    ///
    /// Succeeds when the primary accepts the write within the configured
    /// attempts, or when fallback is enabled and the secondary accepts it.
    pub async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        validate_key(key)?;

        let primary_result = self
            .write_primary(key, &data, content_type, cache_control)
            .await;
        let primary_error = match primary_result {
            Ok(()) => {
                if self.policy.dual_write_secondary {
                    self.best_effort(
                        key,
                        StorageMetric::SecondaryUploadSuccess,
                        StorageMetric::SecondaryUploadError,
                        self.secondary
                            .upload_object(key, data, content_type, cache_control),
                    )
                    .await;
                }
                return Ok(());
            }
            Err(e) => e,
        };

        if !self.policy.fallback_to_secondary {
            return Err(primary_error);
        }

        self.record(
            MetricEvent::new(StorageMetric::SecondaryUploadFallback, key).with_error(&primary_error),
        );

        match self
            .secondary
            .upload_object(key, data, content_type, cache_control)
            .await
        {
            Ok(()) => {
                self.record(MetricEvent::new(StorageMetric::SecondaryUploadSuccess, key));
                Ok(())
            }
            Err(secondary_error) => {
                self.record(
                    MetricEvent::new(StorageMetric::SecondaryUploadError, key)
                        .with_error(&secondary_error),
                );
                Err(StorageError::FallbackFailed {
                    primary: primary_error.to_string(),
                    secondary: secondary_error.to_string(),
                })
            }
        }
    }

    /// Remove an object.
    ///
    /// A failed primary delete is raised only when fallback is disabled.
    /// Otherwise the secondary copy is removed instead, best-effort. The
    /// secondary is touched at most once per call.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;

        let primary_failed = match self.primary.delete_object(key).await {
            Ok(()) => {
                self.record(MetricEvent::new(StorageMetric::PrimaryDeleteSuccess, key));
                false
            }
            Err(e) => {
                self.record(MetricEvent::new(StorageMetric::PrimaryDeleteError, key).with_error(&e));
                if !self.policy.fallback_to_secondary {
                    return Err(e);
                }
                true
            }
        };

        if primary_failed || self.policy.dual_write_secondary {
            self.best_effort(
                key,
                StorageMetric::SecondaryDeleteSuccess,
                StorageMetric::SecondaryDeleteError,
                self.secondary.delete_object(key),
            )
            .await;
        }

        Ok(())
    }

    /// Permanent public URL for `key`, resolved from the read source.
    pub fn get_public_url(&self, key: &str) -> StorageResult<String> {
        if self.policy.read_source == StorageBackend::Secondary {
            return self.secondary.get_public_url(key);
        }

        match self.primary.get_public_url(key) {
            Ok(url) => Ok(url),
            Err(e) if self.policy.fallback_to_secondary => {
                self.record(
                    MetricEvent::new(StorageMetric::PrimaryPublicUrlFallback, key).with_error(&e),
                );
                self.secondary.get_public_url(key)
            }
            Err(e) => Err(e),
        }
    }

    /// URL to hand to clients: signed when the primary has no public base,
    /// public otherwise.
    pub async fn get_access_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if self.policy.read_source == StorageBackend::Primary
            && self.primary.should_use_signed_urls()
        {
            return match self.primary.get_signed_url(key, expires_in).await {
                Ok(url) => Ok(url),
                Err(e) if self.policy.fallback_to_secondary => {
                    self.record(
                        MetricEvent::new(StorageMetric::PrimaryPublicUrlFallback, key)
                            .with_error(&e),
                    );
                    self.secondary.get_public_url(key)
                }
                Err(e) => Err(e),
            };
        }

        self.get_public_url(key)
    }

    /// Read an object from the read source.
    pub async fn download_object(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;

        if self.policy.read_source == StorageBackend::Secondary {
            return self.secondary.download_object(key).await;
        }

        match self.primary.download_object(key).await {
            Ok(data) => Ok(data),
            Err(e) if self.policy.fallback_to_secondary => {
                self.record(
                    MetricEvent::new(StorageMetric::PrimaryDownloadFallback, key).with_error(&e),
                );
                self.secondary.download_object(key).await
            }
            Err(e) => Err(e),
        }
    }

    /// Objects held by the secondary under `prefix`, for migration.
    pub async fn list_secondary_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.secondary.list_objects(prefix).await
    }

    /// Copy one object from the secondary into the primary.
    ///
    /// Uses the primary retry loop without fallback. Content type and
    /// cache-control reported by the source are kept; when unknown they are
    /// derived from the key. The primary copy must have the length the
    /// source reported and the length actually downloaded.
    pub async fn migrate_object(&self, source: &ObjectInfo) -> StorageResult<MigratedObject> {
        let key = source.key.as_str();
        validate_key(key)?;

        let data = self.secondary.download_object(key).await?;
        let expected = data.len() as u64;
        if let Some(reported) = source.size_bytes {
            if reported != expected {
                return Err(StorageError::Integrity {
                    key: key.to_string(),
                    reason: format!(
                        "secondary reported {} bytes, downloaded {}",
                        reported, expected
                    ),
                });
            }
        }

        let content_type = source
            .content_type
            .as_deref()
            .or_else(|| content_type_for_key(key));
        let cache_control = source
            .cache_control
            .as_deref()
            .unwrap_or(CACHE_CONTROL_IMMUTABLE);

        self.write_primary(key, &data, content_type, Some(cache_control))
            .await?;

        let stored = self.primary.download_object(key).await?;
        if stored.len() as u64 != expected {
            return Err(StorageError::Integrity {
                key: key.to_string(),
                reason: format!(
                    "primary holds {} bytes, secondary holds {}",
                    stored.len(),
                    expected
                ),
            });
        }

        tracing::info!(
            key = %key,
            size_bytes = expected,
            content_type = ?content_type,
            "Object migrated to primary"
        );

        Ok(MigratedObject {
            key: key.to_string(),
            size_bytes: expected,
        })
    }

    /// Public base URLs both backends serve objects under.
    pub fn known_public_bases(&self) -> Vec<String> {
        [&self.primary, &self.secondary]
            .iter()
            .filter_map(|backend| backend.get_public_url("").ok())
            .map(|url| url.trim_end_matches('/').to_string())
            .collect()
    }

    /// Accept either an object key or a full public URL of a known backend.
    pub fn resolve_key(&self, value: &str) -> String {
        let bases = self.known_public_bases();
        let bases: Vec<&str> = bases.iter().map(String::as_str).collect();
        key_from_public_url(value, &bases)
            .unwrap_or_else(|| value.trim().trim_start_matches('/').to_string())
    }

    async fn write_primary(
        &self,
        key: &str,
        data: &Bytes,
        content_type: Option<&str>,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        let attempts = self.policy.primary_write_attempts();
        let mut attempt = 1;

        loop {
            match self
                .primary
                .upload_object(key, data.clone(), content_type, cache_control)
                .await
            {
                Ok(()) => {
                    self.record(
                        MetricEvent::new(StorageMetric::PrimaryUploadSuccess, key)
                            .with_attempt(attempt),
                    );
                    return Ok(());
                }
                Err(e) => {
                    self.record(
                        MetricEvent::new(StorageMetric::PrimaryUploadError, key)
                            .with_attempt(attempt)
                            .with_error(&e),
                    );
                    if attempt >= attempts {
                        return Err(e);
                    }
                }
            }

            let delay = self.policy.retry_delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    /// Run a secondary side operation: record its outcome, never propagate.
    async fn best_effort<F>(
        &self,
        key: &str,
        success: StorageMetric,
        failure: StorageMetric,
        operation: F,
    ) where
        F: Future<Output = StorageResult<()>>,
    {
        match operation.await {
            Ok(()) => self.record(MetricEvent::new(success, key)),
            Err(e) => self.record(MetricEvent::new(failure, key).with_error(&e)),
        }
    }

    fn record(&self, event: MetricEvent) {
        self.metrics.record(event);
    }
}

fn content_type_for_key(key: &str) -> Option<&'static str> {
    let extension = key.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
