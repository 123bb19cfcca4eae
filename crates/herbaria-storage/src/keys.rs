//! Object key and public URL helpers.
//!
//! Key format: `{tag}/{entity-dir}/{file-id}.{ext}` where `tag` is `original`
//! or `w={width}` and `entity-dir` comes from the entity path registry
//! (`species/12`, `home/carousel`, ...). All renditions of one photo share the
//! same `file-id`.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Resolution tier of a stored rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionTag {
    Original,
    Width(u32),
}

impl Display for ResolutionTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ResolutionTag::Original => f.write_str("original"),
            ResolutionTag::Width(w) => write!(f, "w={}", w),
        }
    }
}

impl FromStr for ResolutionTag {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "original" {
            return Ok(ResolutionTag::Original);
        }
        s.strip_prefix("w=")
            .and_then(|w| w.parse::<u32>().ok())
            .filter(|w| *w > 0)
            .map(ResolutionTag::Width)
            .ok_or_else(|| StorageError::InvalidKey(format!("Unknown resolution tag: {}", s)))
    }
}

/// Structured object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub tag: ResolutionTag,
    pub entity_dir: String,
    pub file_id: Uuid,
    pub extension: String,
}

impl ObjectKey {
    /// Key for an original upload. The extension is lowercased and stripped
    /// of any leading dot; an empty extension falls back to `jpg`.
    pub fn original(entity_dir: &str, file_id: Uuid, extension: &str) -> Self {
        let extension = extension.trim().trim_start_matches('.').to_lowercase();
        ObjectKey {
            tag: ResolutionTag::Original,
            entity_dir: entity_dir.trim_matches('/').to_string(),
            file_id,
            extension: if extension.is_empty() {
                "jpg".to_string()
            } else {
                extension
            },
        }
    }

    /// Key for a width-bound variant. Variants are always JPEG.
    pub fn variant(entity_dir: &str, file_id: Uuid, width: u32) -> Self {
        ObjectKey {
            tag: ResolutionTag::Width(width),
            entity_dir: entity_dir.trim_matches('/').to_string(),
            file_id,
            extension: "jpg".to_string(),
        }
    }

    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}/{}/{}.{}",
            self.tag, self.entity_dir, self.file_id, self.extension
        )
    }
}

/// Reject keys that could escape the bucket prefix or are empty.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains a parent segment: {}",
            key
        )));
    }
    Ok(())
}

/// Trim, add `https://` when no scheme is present, and strip trailing slashes.
pub fn normalize_base_url(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Join a base URL and a key with exactly one slash.
pub fn join_public_url(base_url: &str, key: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        key.trim_start_matches('/')
    )
}

/// Recover an object key from a full URL stored where a key was expected.
///
/// Returns `None` for values that are not http(s) URLs or that do not live
/// under any of the given public base URLs.
pub fn key_from_public_url(value: &str, public_bases: &[&str]) -> Option<String> {
    let value = value.trim();
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return None;
    }
    let without_query = value.split(['?', '#']).next().unwrap_or(value);

    public_bases.iter().find_map(|base| {
        let base = normalize_base_url(base);
        without_query
            .strip_prefix(base.as_str())
            .filter(|rest| rest.starts_with('/'))
            .map(|rest| rest.trim_start_matches('/').to_string())
            .filter(|key| !key.is_empty())
    })
}
