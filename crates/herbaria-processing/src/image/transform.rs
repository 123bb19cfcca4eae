//! Pixel-level operations used by the variant processor.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, Rgb, RgbImage};

/// Composite onto an opaque white background.
///
/// Images without an alpha channel are only converted to 8-bit RGB.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Downscale so the longer side is at most `bound`, preserving aspect ratio.
pub fn fit_within(image: &RgbImage, bound: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= bound {
        return image.clone();
    }

    let scale = |side: u32| ((side as u64 * bound as u64) / longest as u64).max(1) as u32;
    imageops::resize(image, scale(width), scale(height), FilterType::Lanczos3)
}

/// Downscale to `target_width`, preserving aspect ratio. Never upscales.
pub fn resize_to_width(image: &RgbImage, target_width: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width <= target_width {
        return image.clone();
    }

    let target_height = ((height as u64 * target_width as u64) / width as u64).max(1) as u32;
    imageops::resize(image, target_width, target_height, FilterType::Lanczos3)
}

/// Baseline JPEG at the given quality (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buffer)
}
