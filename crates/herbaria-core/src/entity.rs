//! Entity path registry
//!
//! Maps each logical entity that can own photos to the metadata column that
//! links a photo to it, the table used to verify the entity exists, and the
//! prefix under which its objects are stored.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::SITE_CONTENT_SUBFOLDER;

/// Logical owner of a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Species,
    Sector,
    Specimen,
    SiteContent,
}

/// Storage and metadata linkage for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityPath {
    /// Column of the photo record holding the owner's id. `None` for
    /// free-standing content that is not linked to any row.
    pub foreign_key_column: Option<&'static str>,
    /// Table holding the owning rows, if any.
    pub table: Option<&'static str>,
    /// First segment of every object key stored for this entity.
    pub path_prefix: &'static str,
    /// Whether the owner must be looked up before an upload is accepted.
    pub requires_existence_check: bool,
}

const SPECIES: EntityPath = EntityPath {
    foreign_key_column: Some("species_id"),
    table: Some("species"),
    path_prefix: "species",
    requires_existence_check: true,
};

const SECTOR: EntityPath = EntityPath {
    foreign_key_column: Some("sector_id"),
    table: Some("sectors"),
    path_prefix: "sectors",
    requires_existence_check: true,
};

const SPECIMEN: EntityPath = EntityPath {
    foreign_key_column: Some("specimen_id"),
    table: Some("specimens"),
    path_prefix: "specimens",
    requires_existence_check: true,
};

const SITE_CONTENT: EntityPath = EntityPath {
    foreign_key_column: None,
    table: None,
    path_prefix: "home",
    requires_existence_check: false,
};

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Species,
        EntityType::Sector,
        EntityType::Specimen,
        EntityType::SiteContent,
    ];

    /// Registry lookup.
    pub fn path(self) -> &'static EntityPath {
        match self {
            EntityType::Species => &SPECIES,
            EntityType::Sector => &SECTOR,
            EntityType::Specimen => &SPECIMEN,
            EntityType::SiteContent => &SITE_CONTENT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Species => "species",
            EntityType::Sector => "sector",
            EntityType::Specimen => "specimen",
            EntityType::SiteContent => "site-content",
        }
    }

    /// Directory (prefix plus id or subfolder) that holds the entity's objects.
    ///
    /// Entities without a backing table share one subfolder instead of an id.
    pub fn storage_dir(self, entity_id: i64) -> String {
        let path = self.path();
        if path.table.is_none() {
            format!("{}/{}", path.path_prefix, SITE_CONTENT_SUBFOLDER)
        } else {
            format!("{}/{}", path.path_prefix, entity_id)
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "species" | "especie" => Ok(EntityType::Species),
            "sector" => Ok(EntityType::Sector),
            "specimen" | "ejemplar" => Ok(EntityType::Specimen),
            "site-content" | "site_content" | "home" => Ok(EntityType::SiteContent),
            _ => Err(format!(
                "Invalid entity type: {} (expected one of: species, sector, specimen, site-content)",
                s
            )),
        }
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
