//! Constants shared across crates.

/// Cache-Control directive attached to every stored photo rendition.
///
/// Keys are never overwritten, so renditions can be cached forever.
pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Larger image dimension above which an uploaded original is downscaled.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 2048;

/// Widths of the derivative renditions generated for every photo.
pub const DEFAULT_VARIANT_WIDTHS: [u32; 2] = [400, 800];

/// JPEG quality used for re-encoded originals and variants.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Bucket used by the secondary backend when none is configured.
pub const DEFAULT_SECONDARY_BUCKET: &str = "photos";

/// Default lifetime of signed URLs handed out by the primary backend.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

/// Subfolder used for entities that have no backing row (site content).
pub const SITE_CONTENT_SUBFOLDER: &str = "carousel";
