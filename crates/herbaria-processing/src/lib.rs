//! Herbaria Processing Library
//!
//! Turns uploaded photos into stored renditions: a bounded original plus
//! width-bound JPEG variants, written through the storage router and
//! recorded in a photo metadata store.

pub mod error;
pub mod image;
pub mod upload;

pub use error::{ProcessingError, UploadError};
pub use crate::image::{ImageVariantProcessor, ProcessedImage, VariantImage};
#[cfg(any(test, feature = "test-helpers"))]
pub use upload::KnownEntities;
pub use upload::{
    AssumeEntitiesExist, BatchOutcome, EntityDirectory, InMemoryPhotoStore, PhotoMetadataStore,
    PhotoService, PhotoUploader, SkippedFile, UploadFile,
};
