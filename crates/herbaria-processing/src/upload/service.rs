//! Read and delete side of the photo workflow.

use std::collections::BTreeMap;
use std::sync::Arc;

use herbaria_core::{EntityType, PhotoRecord, PhotoUpdate, PhotoView, VariantMap};
use herbaria_storage::{StorageResult, StorageRouter};

use super::traits::PhotoMetadataStore;
use crate::error::UploadError;

/// Public URL of the original and of every variant.
pub(crate) fn resolve_urls(
    router: &StorageRouter,
    storage_path: &str,
    variants: &VariantMap,
) -> StorageResult<(String, BTreeMap<String, String>)> {
    let public_url = router.get_public_url(storage_path)?;
    let variant_urls = variants
        .iter()
        .filter(|(_, key)| !key.is_empty())
        .map(|(tag, key)| -> StorageResult<(String, String)> {
            Ok((tag.clone(), router.get_public_url(key)?))
        })
        .collect::<StorageResult<BTreeMap<_, _>>>()?;
    Ok((public_url, variant_urls))
}

/// Resolve a record's keys to client URLs through the router.
pub fn photo_view(router: &StorageRouter, record: PhotoRecord) -> StorageResult<PhotoView> {
    let (public_url, variant_urls) = resolve_urls(router, &record.storage_path, &record.variants)?;
    Ok(PhotoView {
        record,
        public_url,
        variant_urls,
    })
}

/// The photo flagged as cover, else the lowest `order_index`.
fn pick_cover<'a>(photos: impl IntoIterator<Item = &'a PhotoRecord>) -> Option<&'a PhotoRecord> {
    let mut first: Option<&PhotoRecord> = None;
    for photo in photos {
        if photo.is_cover {
            return Some(photo);
        }
        if first.map_or(true, |f| (photo.order_index, photo.id) < (f.order_index, f.id)) {
            first = Some(photo);
        }
    }
    first
}

pub struct PhotoService {
    router: Arc<StorageRouter>,
    photos: Arc<dyn PhotoMetadataStore>,
}

impl PhotoService {
    pub fn new(router: Arc<StorageRouter>, photos: Arc<dyn PhotoMetadataStore>) -> Self {
        Self { router, photos }
    }

    /// Photos of an entity with public URLs, in display order.
    pub async fn list_photos(
        &self,
        entity: EntityType,
        entity_id: i64,
    ) -> Result<Vec<PhotoView>, UploadError> {
        self.photos
            .list_photos(entity, entity_id)
            .await?
            .into_iter()
            .map(|record| photo_view(&self.router, record).map_err(UploadError::from))
            .collect()
    }

    /// The photo marked as cover, else the first one in display order.
    pub async fn cover_photo(
        &self,
        entity: EntityType,
        entity_id: i64,
    ) -> Result<Option<PhotoView>, UploadError> {
        let photos = self.photos.list_photos(entity, entity_id).await?;

        pick_cover(&photos)
            .cloned()
            .map(|record| photo_view(&self.router, record))
            .transpose()
            .map_err(UploadError::from)
    }

    /// Cover URL of each entity that has at least one photo, for listings.
    pub async fn cover_photos_map(
        &self,
        entity: EntityType,
        entity_ids: &[i64],
    ) -> Result<BTreeMap<i64, String>, UploadError> {
        if entity_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let photos = self
            .photos
            .list_photos_for_entities(entity, entity_ids)
            .await?;

        let mut covers = BTreeMap::new();
        for &entity_id in entity_ids {
            let cover = pick_cover(
                photos
                    .iter()
                    .filter(|p| p.entity_id == entity_id && !p.storage_path.is_empty()),
            );
            if let Some(cover) = cover {
                covers.insert(entity_id, self.router.get_public_url(&cover.storage_path)?);
            }
        }

        Ok(covers)
    }

    /// Change cover flag, order or caption of one photo.
    ///
    /// Marking a photo as cover unmarks the entity's other photos.
    pub async fn update_photo(
        &self,
        photo_id: i64,
        update: PhotoUpdate,
    ) -> Result<PhotoView, UploadError> {
        let record = self
            .photos
            .get_photo(photo_id)
            .await?
            .ok_or(UploadError::PhotoNotFound(photo_id))?;

        if update.is_empty() {
            return Ok(photo_view(&self.router, record)?);
        }

        if update.is_cover == Some(true) {
            self.photos
                .clear_covers(record.entity, record.entity_id, Some(photo_id))
                .await?;
        }
        let updated = self.photos.update_photo(photo_id, &update).await?;

        tracing::info!(
            photo_id,
            entity = %updated.entity,
            entity_id = updated.entity_id,
            is_cover = updated.is_cover,
            order_index = updated.order_index,
            "Photo updated"
        );

        Ok(photo_view(&self.router, updated)?)
    }

    /// Delete a photo's objects, then its record.
    ///
    /// Storage failures are logged and do not keep the record alive.
    pub async fn delete_photo(&self, photo_id: i64) -> Result<(), UploadError> {
        let record = self
            .photos
            .get_photo(photo_id)
            .await?
            .ok_or(UploadError::PhotoNotFound(photo_id))?;

        for key in record.object_keys() {
            if let Err(e) = self.router.delete_object(key).await {
                tracing::warn!(
                    error = %e,
                    photo_id,
                    key = %key,
                    "Failed to delete photo object from storage"
                );
            }
        }

        self.photos.delete_photo(photo_id).await?;

        tracing::info!(
            photo_id,
            entity = %record.entity,
            entity_id = record.entity_id,
            "Photo deleted"
        );

        Ok(())
    }
}
