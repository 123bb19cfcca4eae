//! Upload pipeline: verify owner → process → store renditions → record.

use std::sync::Arc;

use herbaria_core::constants::CACHE_CONTROL_IMMUTABLE;
use herbaria_core::{EntityType, NewPhoto, PhotoUpdate, PhotoView, VariantMap};
use herbaria_storage::{ObjectKey, StorageRouter};
use uuid::Uuid;

use super::service::resolve_urls;
use super::traits::{EntityDirectory, PhotoMetadataStore};
use super::types::{BatchOutcome, SkippedFile, UploadFile};
use crate::error::UploadError;
use crate::image::{ImageVariantProcessor, ProcessedImage};

const VARIANT_CONTENT_TYPE: &str = "image/jpeg";

/// Where and how one photo of a batch is stored.
struct Placement<'a> {
    entity: EntityType,
    entity_id: i64,
    dir: &'a str,
    is_cover: bool,
    order_index: i32,
}

pub struct PhotoUploader {
    router: Arc<StorageRouter>,
    processor: ImageVariantProcessor,
    photos: Arc<dyn PhotoMetadataStore>,
    entities: Arc<dyn EntityDirectory>,
}

impl PhotoUploader {
    pub fn new(
        router: Arc<StorageRouter>,
        processor: ImageVariantProcessor,
        photos: Arc<dyn PhotoMetadataStore>,
        entities: Arc<dyn EntityDirectory>,
    ) -> Self {
        Self {
            router,
            processor,
            photos,
            entities,
        }
    }

    /// Store a batch of photos for one entity.
    ///
    /// Fails as a whole only when the entity does not exist or its photos
    /// cannot be listed. Any per-file failure skips that file.
    pub async fn upload_photos(
        &self,
        entity: EntityType,
        entity_id: i64,
        files: Vec<UploadFile>,
    ) -> Result<BatchOutcome, UploadError> {
        self.upload_photos_with_cover(entity, entity_id, files, None)
            .await
    }

    /// Like [`upload_photos`](Self::upload_photos), but makes an existing
    /// photo of the entity its cover first. New photos are then never
    /// marked as cover. An id that is not a photo of this entity fails the
    /// call before anything is stored.
    pub async fn upload_photos_with_cover(
        &self,
        entity: EntityType,
        entity_id: i64,
        files: Vec<UploadFile>,
        cover_photo_id: Option<i64>,
    ) -> Result<BatchOutcome, UploadError> {
        let path = entity.path();
        if path.requires_existence_check
            && !self.entities.entity_exists(entity, entity_id).await?
        {
            return Err(UploadError::EntityNotFound {
                entity,
                id: entity_id,
            });
        }

        let existing = self.photos.list_photos(entity, entity_id).await?;
        let max_order = existing.iter().map(|p| p.order_index).max().unwrap_or(0);
        let mut has_cover = existing.iter().any(|p| p.is_cover);

        if let Some(cover_id) = cover_photo_id {
            if !existing.iter().any(|p| p.id == cover_id) {
                return Err(UploadError::PhotoNotFound(cover_id));
            }
            self.photos
                .clear_covers(entity, entity_id, Some(cover_id))
                .await?;
            self.photos
                .update_photo(
                    cover_id,
                    &PhotoUpdate {
                        is_cover: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
            has_cover = true;
        }
        let dir = entity.storage_dir(entity_id);

        let mut outcome = BatchOutcome::default();
        for file in files {
            let placement = Placement {
                entity,
                entity_id,
                dir: &dir,
                is_cover: !has_cover,
                order_index: max_order + outcome.uploaded.len() as i32 + 1,
            };

            match self.store_photo(&file, placement).await {
                Ok(view) => {
                    has_cover |= view.record.is_cover;
                    outcome.uploaded.push(view);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        filename = %file.filename,
                        entity = %entity,
                        entity_id,
                        "Skipping photo"
                    );
                    outcome.skipped.push(SkippedFile {
                        filename: file.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            entity = %entity,
            entity_id,
            uploaded = outcome.uploaded.len(),
            skipped = outcome.skipped.len(),
            "Photo batch processed"
        );

        Ok(outcome)
    }

    /// Process and persist one file. Objects already written are removed
    /// again when a later step fails, so a skipped file leaves nothing behind.
    async fn store_photo(
        &self,
        file: &UploadFile,
        placement: Placement<'_>,
    ) -> Result<PhotoView, UploadError> {
        let processed = self
            .processor
            .process(file.data.clone(), &file.content_type, &file.extension())
            .await?;

        let mut written = Vec::new();
        let result = self.persist(processed, placement, &mut written).await;
        if result.is_err() {
            self.discard(&written).await;
        }
        result
    }

    async fn persist(
        &self,
        processed: ProcessedImage,
        placement: Placement<'_>,
        written: &mut Vec<String>,
    ) -> Result<PhotoView, UploadError> {
        let file_id = Uuid::new_v4();
        let original_key = ObjectKey::original(placement.dir, file_id, &processed.extension);
        let storage_path = original_key.as_key();

        self.router
            .upload_object(
                &storage_path,
                processed.original,
                Some(&processed.content_type),
                Some(CACHE_CONTROL_IMMUTABLE),
            )
            .await?;
        written.push(storage_path.clone());

        let mut variants = VariantMap::new();
        for variant in processed.variants {
            let key = ObjectKey::variant(placement.dir, file_id, variant.target_width);
            let variant_path = key.as_key();
            self.router
                .upload_object(
                    &variant_path,
                    variant.data,
                    Some(VARIANT_CONTENT_TYPE),
                    Some(CACHE_CONTROL_IMMUTABLE),
                )
                .await?;
            written.push(variant_path.clone());
            variants.insert(key.tag.to_string(), variant_path);
        }

        // URLs first: a skipped file must not leave a record behind.
        let (public_url, variant_urls) = resolve_urls(&self.router, &storage_path, &variants)?;

        let record = self
            .photos
            .insert_photo(NewPhoto {
                entity: placement.entity,
                entity_id: placement.entity_id,
                storage_path,
                variants,
                is_cover: placement.is_cover,
                order_index: placement.order_index,
            })
            .await?;

        tracing::debug!(
            photo_id = record.id,
            storage_path = %record.storage_path,
            reencoded = processed.reencoded,
            "Photo stored"
        );

        Ok(PhotoView {
            record,
            public_url,
            variant_urls,
        })
    }

    async fn discard(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.router.delete_object(key).await {
                tracing::warn!(error = %e, key = %key, "Failed to remove object of skipped photo");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::memory::{InMemoryPhotoStore, KnownEntities};
    use bytes::Bytes;
    use herbaria_core::ImageConfig;
    use herbaria_storage::{MemoryStorage, RoutingPolicy};
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    struct Harness {
        primary: Arc<MemoryStorage>,
        secondary: Arc<MemoryStorage>,
        store: Arc<InMemoryPhotoStore>,
        uploader: PhotoUploader,
    }

    fn harness(policy: RoutingPolicy, entities: KnownEntities) -> Harness {
        let primary = Arc::new(MemoryStorage::primary());
        let secondary = Arc::new(MemoryStorage::secondary());
        let router = Arc::new(StorageRouter::new(
            primary.clone(),
            secondary.clone(),
            policy,
        ));
        let store = Arc::new(InMemoryPhotoStore::new());
        let processor = ImageVariantProcessor::new(ImageConfig {
            max_dimension: 64,
            variant_widths: vec![16, 32],
            jpeg_quality: 85,
        });
        let uploader = PhotoUploader::new(router, processor, store.clone(), Arc::new(entities));
        Harness {
            primary,
            secondary,
            store,
            uploader,
        }
    }

    fn png(width: u32, height: u32) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, Rgba([30, 120, 60, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer)
    }

    fn species(id: i64) -> KnownEntities {
        KnownEntities::new().with(EntityType::Species, id)
    }

    #[tokio::test]
    async fn batch_skips_undecodable_file() {
        let h = harness(RoutingPolicy::default(), species(1));
        let files = vec![
            UploadFile::new("a.png", "image/png", png(40, 20)),
            UploadFile::new("broken.png", "image/png", Bytes::from_static(b"garbage")),
            UploadFile::new("c.png", "image/png", png(20, 40)),
        ];

        let outcome = h
            .uploader
            .upload_photos(EntityType::Species, 1, files)
            .await
            .unwrap();

        assert_eq!(outcome.uploaded.len(), 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].filename, "broken.png");
        assert_eq!(h.store.len().await, 2);

        let orders: Vec<(i32, bool)> = outcome
            .uploaded
            .iter()
            .map(|p| (p.record.order_index, p.record.is_cover))
            .collect();
        assert_eq!(orders, vec![(1, true), (2, false)]);

        // original plus two variants per stored photo
        assert_eq!(h.primary.object_count(), 6);
        assert_eq!(h.secondary.object_count(), 0);
    }

    #[tokio::test]
    async fn keys_share_file_id_across_renditions() {
        let h = harness(RoutingPolicy::default(), species(3));
        let outcome = h
            .uploader
            .upload_photos(
                EntityType::Species,
                3,
                vec![UploadFile::new("leaf.PNG", "image/png", png(40, 20))],
            )
            .await
            .unwrap();

        let photo = &outcome.uploaded[0];
        let path = &photo.record.storage_path;
        assert!(path.starts_with("original/species/3/"));
        assert!(path.ends_with(".png"));

        let file_id = path
            .trim_start_matches("original/species/3/")
            .trim_end_matches(".png");
        assert_eq!(
            photo.record.variants["w=16"],
            format!("w=16/species/3/{}.jpg", file_id)
        );
        assert_eq!(
            photo.record.variants["w=32"],
            format!("w=32/species/3/{}.jpg", file_id)
        );
        assert_eq!(photo.public_url, format!("https://primary.test/{}", path));

        let stored = h.primary.get_object(path).unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("image/png"));
        assert_eq!(stored.cache_control.as_deref(), Some(CACHE_CONTROL_IMMUTABLE));
    }

    #[tokio::test]
    async fn oversized_original_stored_as_jpeg() {
        let h = harness(RoutingPolicy::default(), species(1));
        let outcome = h
            .uploader
            .upload_photos(
                EntityType::Species,
                1,
                vec![UploadFile::new("big.png", "image/png", png(200, 100))],
            )
            .await
            .unwrap();

        let path = &outcome.uploaded[0].record.storage_path;
        assert!(path.ends_with(".jpg"));
        let stored = h.primary.get_object(path).unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(&stored.data[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn missing_entity_rejects_whole_batch() {
        let h = harness(RoutingPolicy::default(), KnownEntities::new());
        let result = h
            .uploader
            .upload_photos(
                EntityType::Sector,
                9,
                vec![UploadFile::new("a.png", "image/png", png(10, 10))],
            )
            .await;

        assert!(matches!(
            result,
            Err(UploadError::EntityNotFound {
                entity: EntityType::Sector,
                id: 9
            })
        ));
        assert_eq!(h.primary.object_count(), 0);
    }

    #[tokio::test]
    async fn site_content_skips_existence_check() {
        let h = harness(RoutingPolicy::default(), KnownEntities::new());
        let outcome = h
            .uploader
            .upload_photos(
                EntityType::SiteContent,
                0,
                vec![UploadFile::new("hero.png", "image/png", png(10, 10))],
            )
            .await
            .unwrap();

        assert!(outcome.uploaded[0]
            .record
            .storage_path
            .starts_with("original/home/carousel/"));
    }

    #[tokio::test]
    async fn later_batches_continue_order_and_keep_cover() {
        let h = harness(RoutingPolicy::default(), species(1));
        h.uploader
            .upload_photos(
                EntityType::Species,
                1,
                vec![UploadFile::new("a.png", "image/png", png(10, 10))],
            )
            .await
            .unwrap();

        let outcome = h
            .uploader
            .upload_photos(
                EntityType::Species,
                1,
                vec![
                    UploadFile::new("notes.txt", "text/plain", Bytes::from_static(b"hi")),
                    UploadFile::new("b.png", "image/png", png(10, 10)),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.uploaded.len(), 1);
        assert_eq!(outcome.uploaded[0].record.order_index, 2);
        assert!(!outcome.uploaded[0].record.is_cover);
    }

    #[tokio::test]
    async fn failing_primary_falls_back_per_object() {
        let h = harness(RoutingPolicy::default(), species(1));
        h.primary.fail_all_uploads();

        let outcome = h
            .uploader
            .upload_photos(
                EntityType::Species,
                1,
                vec![UploadFile::new("a.png", "image/png", png(10, 10))],
            )
            .await
            .unwrap();

        assert_eq!(outcome.uploaded.len(), 1);
        assert_eq!(h.primary.object_count(), 0);
        assert_eq!(h.secondary.object_count(), 3);
    }

    #[tokio::test]
    async fn unresolvable_urls_skip_without_persisting() {
        let h = harness(
            RoutingPolicy {
                fallback_to_secondary: false,
                ..Default::default()
            },
            species(1),
        );
        h.primary.set_fail_public_urls(true);

        let outcome = h
            .uploader
            .upload_photos(
                EntityType::Species,
                1,
                vec![UploadFile::new("a.png", "image/png", png(10, 10))],
            )
            .await
            .unwrap();

        assert!(outcome.uploaded.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(h.store.is_empty().await);
        assert_eq!(h.primary.object_count(), 0);
    }

    #[tokio::test]
    async fn failed_variant_removes_stored_original() {
        let h = harness(
            RoutingPolicy {
                fallback_to_secondary: false,
                ..Default::default()
            },
            species(1),
        );
        h.primary.reject_uploads_with_prefix("w=");

        let outcome = h
            .uploader
            .upload_photos(
                EntityType::Species,
                1,
                vec![UploadFile::new("a.png", "image/png", png(10, 10))],
            )
            .await
            .unwrap();

        assert_eq!(outcome.skipped.len(), 1);
        assert!(h.store.is_empty().await);
        assert!(h.primary.keys().is_empty());
        assert_eq!(h.primary.delete_attempts(), 1);
    }

    #[tokio::test]
    async fn chosen_cover_replaces_existing_one() {
        let h = harness(RoutingPolicy::default(), species(1));
        let first = h
            .uploader
            .upload_photos(
                EntityType::Species,
                1,
                vec![
                    UploadFile::new("a.png", "image/png", png(10, 10)),
                    UploadFile::new("b.png", "image/png", png(10, 10)),
                ],
            )
            .await
            .unwrap();
        let chosen = first.uploaded[1].record.id;

        let outcome = h
            .uploader
            .upload_photos_with_cover(
                EntityType::Species,
                1,
                vec![UploadFile::new("c.png", "image/png", png(10, 10))],
                Some(chosen),
            )
            .await
            .unwrap();

        assert!(!outcome.uploaded[0].record.is_cover);
        assert_eq!(outcome.uploaded[0].record.order_index, 3);
        let covers: Vec<i64> = h
            .store
            .list_photos(EntityType::Species, 1)
            .await
            .unwrap()
            .iter()
            .filter(|p| p.is_cover)
            .map(|p| p.id)
            .collect();
        assert_eq!(covers, vec![chosen]);
    }

    #[tokio::test]
    async fn unknown_cover_rejects_batch_before_storing() {
        let h = harness(RoutingPolicy::default(), species(1));

        let result = h
            .uploader
            .upload_photos_with_cover(
                EntityType::Species,
                1,
                vec![UploadFile::new("a.png", "image/png", png(10, 10))],
                Some(12),
            )
            .await;

        assert!(matches!(result, Err(UploadError::PhotoNotFound(12))));
        assert_eq!(h.primary.object_count(), 0);
    }
}
