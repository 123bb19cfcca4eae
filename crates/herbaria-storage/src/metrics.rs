//! Storage metric records
//!
//! Every routing decision emits one record. The default sink writes a
//! `storage_metric=<name> key=<key> attempt=<n> error=<text>` line through
//! `tracing`; log processors downstream parse that format.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Metric names. The `r2_` prefix covers the primary backend, `supabase_`
/// the secondary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageMetric {
    PrimaryUploadSuccess,
    PrimaryUploadError,
    SecondaryUploadFallback,
    SecondaryUploadSuccess,
    SecondaryUploadError,
    PrimaryDeleteSuccess,
    PrimaryDeleteError,
    SecondaryDeleteSuccess,
    SecondaryDeleteError,
    PrimaryPublicUrlFallback,
    PrimaryDownloadFallback,
}

impl StorageMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageMetric::PrimaryUploadSuccess => "r2_upload_success",
            StorageMetric::PrimaryUploadError => "r2_upload_error",
            StorageMetric::SecondaryUploadFallback => "supabase_upload_fallback",
            StorageMetric::SecondaryUploadSuccess => "supabase_upload_success",
            StorageMetric::SecondaryUploadError => "supabase_upload_error",
            StorageMetric::PrimaryDeleteSuccess => "r2_delete_success",
            StorageMetric::PrimaryDeleteError => "r2_delete_error",
            StorageMetric::SecondaryDeleteSuccess => "supabase_delete_success",
            StorageMetric::SecondaryDeleteError => "supabase_delete_error",
            StorageMetric::PrimaryPublicUrlFallback => "r2_public_url_fallback",
            StorageMetric::PrimaryDownloadFallback => "r2_download_fallback",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            StorageMetric::PrimaryUploadError
                | StorageMetric::SecondaryUploadError
                | StorageMetric::PrimaryDeleteError
                | StorageMetric::SecondaryDeleteError
        )
    }
}

impl Display for StorageMetric {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// One metric record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEvent {
    pub metric: StorageMetric,
    pub key: String,
    /// 1-based attempt number, for primary write attempts.
    pub attempt: Option<u32>,
    pub error: Option<String>,
}

impl MetricEvent {
    pub fn new(metric: StorageMetric, key: &str) -> Self {
        Self {
            metric,
            key: key.to_string(),
            attempt: None,
            error: None,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_error(mut self, error: impl Display) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

impl Display for MetricEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "storage_metric={} key={}", self.metric, self.key)?;
        if let Some(attempt) = self.attempt {
            write!(f, " attempt={}", attempt)?;
        }
        if let Some(ref error) = self.error {
            write!(f, " error={}", error)?;
        }
        Ok(())
    }
}

/// Destination for metric records.
pub trait MetricSink: Send + Sync {
    fn record(&self, event: MetricEvent);
}

/// Writes metric records to the `herbaria::storage_metric` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricSink;

impl MetricSink for TracingMetricSink {
    fn record(&self, event: MetricEvent) {
        if event.metric.is_error() {
            tracing::warn!(target: "herbaria::storage_metric", "{}", event);
        } else {
            tracing::info!(target: "herbaria::storage_metric", "{}", event);
        }
    }
}

/// Keeps every record in memory, for assertions in tests.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Default)]
pub struct RecordingMetricSink {
    events: std::sync::Mutex<Vec<MetricEvent>>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl RecordingMetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, metric: StorageMetric) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.metric == metric)
            .count()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.metric.as_str())
            .collect()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl MetricSink for RecordingMetricSink {
    fn record(&self, event: MetricEvent) {
        TracingMetricSink.record(event.clone());
        self.events.lock().unwrap().push(event);
    }
}
