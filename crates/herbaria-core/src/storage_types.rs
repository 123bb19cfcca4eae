use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend roles.
///
/// Used both to tag adapters and to select which backend resolves reads
/// (public URLs and downloads) by default.
///
/// The legacy values `r2` and `supabase` are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Primary,
    Secondary,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "r2" => Ok(StorageBackend::Primary),
            "secondary" | "supabase" => Ok(StorageBackend::Secondary),
            _ => Err(format!(
                "Invalid storage backend: {} (expected 'primary' or 'secondary')",
                s
            )),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Primary => write!(f, "primary"),
            StorageBackend::Secondary => write!(f, "secondary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_legacy_aliases() {
        assert_eq!("primary".parse::<StorageBackend>(), Ok(StorageBackend::Primary));
        assert_eq!(" R2 ".parse::<StorageBackend>(), Ok(StorageBackend::Primary));
        assert_eq!("Secondary".parse::<StorageBackend>(), Ok(StorageBackend::Secondary));
        assert_eq!("supabase".parse::<StorageBackend>(), Ok(StorageBackend::Secondary));
        assert!("gcs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn displays_canonical_name() {
        assert_eq!(StorageBackend::Secondary.to_string(), "secondary");
        assert_eq!(StorageBackend::default().to_string(), "primary");
    }
}
