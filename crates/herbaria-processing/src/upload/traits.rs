//! Seams to the metadata database.

use async_trait::async_trait;
use herbaria_core::{EntityType, NewPhoto, PhotoRecord, PhotoUpdate};

use crate::error::UploadError;

/// Answers whether the owner of a photo exists.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn entity_exists(&self, entity: EntityType, entity_id: i64) -> Result<bool, UploadError>;
}

/// Persistence for photo records.
#[async_trait]
pub trait PhotoMetadataStore: Send + Sync {
    /// Photos of one entity, ordered by `order_index`.
    async fn list_photos(
        &self,
        entity: EntityType,
        entity_id: i64,
    ) -> Result<Vec<PhotoRecord>, UploadError>;

    /// Photos of several entities of one type, each entity's photos ordered
    /// by `order_index`.
    async fn list_photos_for_entities(
        &self,
        entity: EntityType,
        entity_ids: &[i64],
    ) -> Result<Vec<PhotoRecord>, UploadError> {
        let mut photos = Vec::new();
        for &entity_id in entity_ids {
            photos.extend(self.list_photos(entity, entity_id).await?);
        }
        Ok(photos)
    }

    async fn get_photo(&self, photo_id: i64) -> Result<Option<PhotoRecord>, UploadError>;

    async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, UploadError>;

    /// Apply `update` to one photo; unknown id is `PhotoNotFound`.
    async fn update_photo(
        &self,
        photo_id: i64,
        update: &PhotoUpdate,
    ) -> Result<PhotoRecord, UploadError>;

    /// Unmark the cover flag on every photo of the entity except `keep`.
    async fn clear_covers(
        &self,
        entity: EntityType,
        entity_id: i64,
        keep: Option<i64>,
    ) -> Result<(), UploadError>;

    async fn delete_photo(&self, photo_id: i64) -> Result<(), UploadError>;
}
