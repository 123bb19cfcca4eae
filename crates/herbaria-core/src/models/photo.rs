use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::EntityType;

/// Variant tag (`w=400`) to object key.
pub type VariantMap = BTreeMap<String, String>;

/// Photo to be inserted into the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhoto {
    pub entity: EntityType,
    pub entity_id: i64,
    pub storage_path: String,
    #[serde(default)]
    pub variants: VariantMap,
    pub is_cover: bool,
    pub order_index: i32,
}

/// Photo as persisted by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: i64,
    pub entity: EntityType,
    pub entity_id: i64,
    pub storage_path: String,
    #[serde(default)]
    pub variants: VariantMap,
    pub is_cover: bool,
    pub order_index: i32,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PhotoRecord {
    /// Every object key owned by this photo, original first.
    pub fn object_keys(&self) -> Vec<&str> {
        std::iter::once(self.storage_path.as_str())
            .chain(self.variants.values().map(String::as_str))
            .filter(|key| !key.is_empty())
            .collect()
    }
}

/// Changes to an existing photo. `None` leaves a field untouched.
///
/// Setting `is_cover` to `true` unmarks every other photo of the same entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUpdate {
    #[serde(default)]
    pub is_cover: Option<bool>,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl PhotoUpdate {
    pub fn is_empty(&self) -> bool {
        self.is_cover.is_none() && self.order_index.is_none() && self.caption.is_none()
    }

    /// Apply the present fields to `record`.
    pub fn apply_to(&self, record: &mut PhotoRecord) {
        if let Some(is_cover) = self.is_cover {
            record.is_cover = is_cover;
        }
        if let Some(order_index) = self.order_index {
            record.order_index = order_index;
        }
        if let Some(caption) = &self.caption {
            record.caption = Some(caption.clone());
        }
    }
}

/// Photo returned to clients, with keys resolved to URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoView {
    #[serde(flatten)]
    pub record: PhotoRecord,
    pub public_url: String,
    pub variant_urls: BTreeMap<String, String>,
}
