use herbaria_core::EntityType;
use herbaria_storage::StorageError;
use thiserror::Error;

/// Image processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Processing task failed: {0}")]
    Task(String),
}

/// Photo workflow errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{entity} with id {id} not found")]
    EntityNotFound { entity: EntityType, id: i64 },

    #[error("Photo {0} not found")]
    PhotoNotFound(i64),

    #[error("Metadata store error: {0}")]
    Metadata(String),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
