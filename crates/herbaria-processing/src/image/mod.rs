//! Image processing module
//!
//! - Pixel operations: alpha flattening, bounded resize, JPEG encoding (transform)
//! - Original normalization and variant rendering (processor)

pub mod processor;
pub mod transform;

pub use processor::{ImageVariantProcessor, ProcessedImage, VariantImage};
