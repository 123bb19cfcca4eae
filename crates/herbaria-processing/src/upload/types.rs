//! Types for the photo workflow.

use bytes::Bytes;
use herbaria_core::PhotoView;
use serde::Serialize;

use crate::image::ImageVariantProcessor;

/// One file of an upload batch.
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn extension(&self) -> String {
        ImageVariantProcessor::extension_of(&self.filename)
    }
}

/// A file left out of a batch and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// Result of an upload batch.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub uploaded: Vec<PhotoView>,
    pub skipped: Vec<SkippedFile>,
}
