//! Image variant processor - original normalization and width-bound variants

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use herbaria_core::ImageConfig;
use image::{GenericImageView, ImageReader};

use super::transform::{encode_jpeg, fit_within, flatten_onto_white, resize_to_width};
use crate::error::ProcessingError;

const JPEG_CONTENT_TYPE: &str = "image/jpeg";
const JPEG_EXTENSION: &str = "jpg";

/// One rendered variant.
#[derive(Debug, Clone)]
pub struct VariantImage {
    /// Configured width bound; names the variant (`w={target_width}`).
    pub target_width: u32,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

/// Buffers ready for storage.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub original: Bytes,
    pub content_type: String,
    pub extension: String,
    /// True when the original was downscaled and re-encoded as JPEG.
    pub reencoded: bool,
    /// Dimensions of the normalized source the variants were rendered from.
    pub width: u32,
    pub height: u32,
    pub variants: Vec<VariantImage>,
}

/// Produces the stored renditions of one uploaded photo.
#[derive(Debug, Clone)]
pub struct ImageVariantProcessor {
    config: ImageConfig,
}

impl ImageVariantProcessor {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Lowercased extension of `filename` without the dot, `jpg` when absent.
    pub fn extension_of(filename: &str) -> String {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.trim().to_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| JPEG_EXTENSION.to_string())
    }

    pub fn validate_content_type(content_type: &str) -> Result<(), ProcessingError> {
        if content_type.trim().to_lowercase().starts_with("image/") {
            Ok(())
        } else {
            Err(ProcessingError::UnsupportedContentType(
                content_type.to_string(),
            ))
        }
    }

    /// Normalize the original and render every configured variant.
    ///
    /// Decode and encode run on the blocking thread pool.
    pub async fn process(
        &self,
        data: Bytes,
        content_type: &str,
        extension: &str,
    ) -> Result<ProcessedImage, ProcessingError> {
        Self::validate_content_type(content_type)?;

        let config = self.config.clone();
        let content_type = content_type.to_string();
        let extension = extension.to_string();

        tokio::task::spawn_blocking(move || {
            Self::process_blocking(&config, data, &content_type, &extension)
        })
        .await
        .map_err(|e| ProcessingError::Task(e.to_string()))?
    }

    /// Synchronous body of [`process`](Self::process).
    pub fn process_blocking(
        config: &ImageConfig,
        data: Bytes,
        content_type: &str,
        extension: &str,
    ) -> Result<ProcessedImage, ProcessingError> {
        let decoded = ImageReader::new(Cursor::new(data.as_ref()))
            .with_guessed_format()
            .map_err(|e| ProcessingError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| ProcessingError::Decode(e.to_string()))?;

        let (source_width, source_height) = decoded.dimensions();
        let flattened = flatten_onto_white(&decoded);
        let oversized = source_width.max(source_height) > config.max_dimension;

        let (normalized, original, content_type, extension) = if oversized {
            let bounded = fit_within(&flattened, config.max_dimension);
            let jpeg = encode_jpeg(&bounded, config.jpeg_quality)
                .map_err(|e| ProcessingError::Encode(e.to_string()))?;
            tracing::debug!(
                source_width,
                source_height,
                width = bounded.width(),
                height = bounded.height(),
                "Oversized original downscaled"
            );
            (
                bounded,
                Bytes::from(jpeg),
                JPEG_CONTENT_TYPE.to_string(),
                JPEG_EXTENSION.to_string(),
            )
        } else {
            let extension = extension.trim().trim_start_matches('.').to_lowercase();
            let extension = if extension.is_empty() {
                JPEG_EXTENSION.to_string()
            } else {
                extension
            };
            (flattened, data, content_type.to_string(), extension)
        };

        let variants = config
            .variant_widths
            .iter()
            .map(|&target_width| -> Result<VariantImage, ProcessingError> {
                let resized = resize_to_width(&normalized, target_width);
                let jpeg = encode_jpeg(&resized, config.jpeg_quality)
                    .map_err(|e| ProcessingError::Encode(e.to_string()))?;
                Ok(VariantImage {
                    target_width,
                    width: resized.width(),
                    height: resized.height(),
                    data: Bytes::from(jpeg),
                })
            })
            .collect::<Result<Vec<_>, ProcessingError>>()?;

        Ok(ProcessedImage {
            original,
            content_type,
            extension,
            reencoded: oversized,
            width: normalized.width(),
            height: normalized.height(),
            variants,
        })
    }
}
