//! Process-local implementations of the metadata seams.

use std::collections::BTreeMap;
#[cfg(any(test, feature = "test-helpers"))]
use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use herbaria_core::{EntityType, NewPhoto, PhotoRecord, PhotoUpdate};
use tokio::sync::Mutex;

use super::traits::{EntityDirectory, PhotoMetadataStore};
use crate::error::UploadError;

#[derive(Debug, Default)]
struct PhotoTable {
    next_id: i64,
    rows: BTreeMap<i64, PhotoRecord>,
}

/// Photo records kept in memory, ids assigned sequentially from 1.
#[derive(Debug, Default)]
pub struct InMemoryPhotoStore {
    table: Mutex<PhotoTable>,
}

impl InMemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PhotoMetadataStore for InMemoryPhotoStore {
    async fn list_photos(
        &self,
        entity: EntityType,
        entity_id: i64,
    ) -> Result<Vec<PhotoRecord>, UploadError> {
        let table = self.table.lock().await;
        let mut photos: Vec<PhotoRecord> = table
            .rows
            .values()
            .filter(|p| p.entity == entity && p.entity_id == entity_id)
            .cloned()
            .collect();
        photos.sort_by_key(|p| (p.order_index, p.id));
        Ok(photos)
    }

    async fn get_photo(&self, photo_id: i64) -> Result<Option<PhotoRecord>, UploadError> {
        Ok(self.table.lock().await.rows.get(&photo_id).cloned())
    }

    async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, UploadError> {
        let mut table = self.table.lock().await;
        table.next_id += 1;
        let record = PhotoRecord {
            id: table.next_id,
            entity: photo.entity,
            entity_id: photo.entity_id,
            storage_path: photo.storage_path,
            variants: photo.variants,
            is_cover: photo.is_cover,
            order_index: photo.order_index,
            caption: None,
            created_at: Utc::now(),
        };
        table.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_photo(
        &self,
        photo_id: i64,
        update: &PhotoUpdate,
    ) -> Result<PhotoRecord, UploadError> {
        let mut table = self.table.lock().await;
        let record = table
            .rows
            .get_mut(&photo_id)
            .ok_or(UploadError::PhotoNotFound(photo_id))?;
        update.apply_to(record);
        Ok(record.clone())
    }

    async fn clear_covers(
        &self,
        entity: EntityType,
        entity_id: i64,
        keep: Option<i64>,
    ) -> Result<(), UploadError> {
        let mut table = self.table.lock().await;
        table
            .rows
            .values_mut()
            .filter(|p| p.entity == entity && p.entity_id == entity_id && Some(p.id) != keep)
            .for_each(|p| p.is_cover = false);
        Ok(())
    }

    async fn delete_photo(&self, photo_id: i64) -> Result<(), UploadError> {
        self.table
            .lock()
            .await
            .rows
            .remove(&photo_id)
            .map(|_| ())
            .ok_or(UploadError::PhotoNotFound(photo_id))
    }
}

/// Directory that accepts every entity.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeEntitiesExist;

#[async_trait]
impl EntityDirectory for AssumeEntitiesExist {
    async fn entity_exists(&self, _entity: EntityType, _entity_id: i64) -> Result<bool, UploadError> {
        Ok(true)
    }
}

/// Directory backed by a fixed set of known entities.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Default, Clone)]
pub struct KnownEntities {
    known: HashSet<(EntityType, i64)>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl KnownEntities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entity: EntityType, entity_id: i64) -> Self {
        self.known.insert((entity, entity_id));
        self
    }
}

#[cfg(any(test, feature = "test-helpers"))]
#[async_trait]
impl EntityDirectory for KnownEntities {
    async fn entity_exists(&self, entity: EntityType, entity_id: i64) -> Result<bool, UploadError> {
        Ok(self.known.contains(&(entity, entity_id)))
    }
}
