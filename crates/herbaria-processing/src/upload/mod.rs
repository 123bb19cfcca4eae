//! Photo workflow: process → store → record.

pub mod memory;
pub mod pipeline;
pub mod service;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub use memory::KnownEntities;
pub use memory::{AssumeEntitiesExist, InMemoryPhotoStore};
pub use pipeline::PhotoUploader;
pub use service::PhotoService;
pub use traits::{EntityDirectory, PhotoMetadataStore};
pub use types::{BatchOutcome, SkippedFile, UploadFile};
