//! Herbaria Storage Library
//!
//! This crate provides the `ObjectStorage` abstraction, the primary (S3/R2)
//! and secondary (Supabase Storage) adapters and the `StorageRouter` that
//! decides which backend serves each operation.
//!
//! # Storage key format
//!
//! `{tag}/{entity-dir}/{file-id}.{ext}`, where `tag` is `original` or
//! `w={width}`. Both backends use the same keys so an object can move between
//! them unchanged. Keys must not contain `..` segments.

pub mod factory;
pub mod keys;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod metrics;
pub mod router;
pub mod s3;
pub mod supabase;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_backends, create_router};
pub use herbaria_core::StorageBackend;
pub use keys::{ObjectKey, ResolutionTag};
#[cfg(any(test, feature = "test-helpers"))]
pub use memory::MemoryStorage;
pub use metrics::{MetricEvent, MetricSink, StorageMetric, TracingMetricSink};
#[cfg(any(test, feature = "test-helpers"))]
pub use metrics::RecordingMetricSink;
pub use router::{MigratedObject, RoutingPolicy, StorageRouter};
pub use s3::S3Storage;
pub use supabase::SupabaseStorage;
pub use traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
