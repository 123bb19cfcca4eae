//! Herbaria Core Library
//!
//! This crate provides configuration, the entity path registry, error types and
//! photo models shared by the storage, processing and CLI crates.

pub mod config;
pub mod constants;
pub mod entity;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    Config, ImageConfig, PrimaryBackendConfig, SecondaryBackendConfig, StorageConfig,
};
pub use entity::{EntityPath, EntityType};
pub use error::ConfigError;
pub use models::{NewPhoto, PhotoRecord, PhotoUpdate, PhotoView, VariantMap};
pub use storage_types::StorageBackend;
