//! Configuration module
//!
//! Configuration is read once at the composition root and handed to the
//! storage router, the backend adapters and the image processor as an
//! immutable value. Nothing in the library crates reads the environment.

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_IMAGE_DIMENSION, DEFAULT_SECONDARY_BUCKET,
    DEFAULT_VARIANT_WIDTHS,
};
use crate::error::ConfigError;
use crate::storage_types::StorageBackend;

// Defaults
const PRIMARY_WRITE_RETRIES: u32 = 1;
const PRIMARY_RETRY_BACKOFF_MS: u64 = 0;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Primary (S3-compatible) backend settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimaryBackendConfig {
    /// Cloudflare account id; used to derive the R2 endpoint.
    pub account_id: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    /// Explicit endpoint for other S3-compatible providers (MinIO, ...).
    pub endpoint: Option<String>,
    /// Public base URL. When absent, clients must be handed signed URLs.
    pub public_base_url: Option<String>,
}

impl PrimaryBackendConfig {
    /// Endpoint the S3 client talks to.
    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint.clone().or_else(|| {
            self.account_id
                .as_ref()
                .map(|account| format!("https://{}.r2.cloudflarestorage.com", account))
        })
    }
}

/// Secondary (Supabase Storage) backend settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecondaryBackendConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

/// Storage routing policy and backend credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub read_source: StorageBackend,
    pub dual_write_secondary: bool,
    pub fallback_to_secondary: bool,
    /// Extra attempts against the primary before fallback or failure.
    pub primary_write_retries: u32,
    /// Linear backoff step between primary attempts. Zero retries immediately.
    pub primary_retry_backoff: Duration,
    /// Timeout applied to every backend request.
    pub request_timeout: Duration,
    pub primary: PrimaryBackendConfig,
    pub secondary: SecondaryBackendConfig,
}

/// Photo rendition settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageConfig {
    pub max_dimension: u32,
    pub variant_widths: Vec<u32>,
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            variant_widths: DEFAULT_VARIANT_WIDTHS.to_vec(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub storage: StorageConfig,
    pub image: ImageConfig,
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let storage = StorageConfig::from_vars(&vars)?;
        let image = ImageConfig::from_vars(&vars)?;
        let config = Config { storage, image };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.image.validate()
    }

    pub fn read_source(&self) -> StorageBackend {
        self.storage.read_source
    }

    pub fn variant_widths(&self) -> &[u32] {
        &self.image.variant_widths
    }
}

impl StorageConfig {
    fn from_vars(vars: &Vars<'_>) -> Result<Self, ConfigError> {
        let read_source = match vars.get("STORAGE_READ_SOURCE") {
            Some(raw) => raw
                .parse::<StorageBackend>()
                .map_err(|reason| ConfigError::invalid("STORAGE_READ_SOURCE", &raw, reason))?,
            None => StorageBackend::Primary,
        };

        let primary = PrimaryBackendConfig {
            account_id: vars.get("R2_ACCOUNT_ID"),
            access_key_id: vars.require("R2_ACCESS_KEY_ID")?,
            secret_access_key: vars.require("R2_SECRET_ACCESS_KEY")?,
            bucket: vars.require("R2_BUCKET")?,
            endpoint: vars.get("R2_ENDPOINT"),
            public_base_url: vars.get("R2_PUBLIC_BASE_URL"),
        };

        let secondary = SecondaryBackendConfig {
            url: vars.require("SUPABASE_URL")?,
            service_key: vars.require("SUPABASE_SERVICE_KEY")?,
            bucket: vars
                .get("SUPABASE_STORAGE_BUCKET")
                .unwrap_or_else(|| DEFAULT_SECONDARY_BUCKET.to_string()),
        };

        Ok(StorageConfig {
            read_source,
            dual_write_secondary: vars.bool("STORAGE_DUAL_WRITE_SECONDARY", false),
            fallback_to_secondary: vars.bool("STORAGE_FALLBACK_SECONDARY", true),
            primary_write_retries: vars
                .parse("STORAGE_PRIMARY_WRITE_RETRIES")?
                .unwrap_or(PRIMARY_WRITE_RETRIES),
            primary_retry_backoff: Duration::from_millis(
                vars.parse("STORAGE_PRIMARY_RETRY_BACKOFF_MS")?
                    .unwrap_or(PRIMARY_RETRY_BACKOFF_MS),
            ),
            request_timeout: Duration::from_secs(
                vars.parse("STORAGE_REQUEST_TIMEOUT_SECS")?
                    .unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
            primary,
            secondary,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary.account_id.is_none() && self.primary.endpoint.is_none() {
            return Err(ConfigError::Missing("R2_ACCOUNT_ID"));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "STORAGE_REQUEST_TIMEOUT_SECS",
                "0",
                "timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Total number of attempts made against the primary for one write.
    pub fn primary_write_attempts(&self) -> u32 {
        self.primary_write_retries.saturating_add(1)
    }
}

impl ImageConfig {
    fn from_vars(vars: &Vars<'_>) -> Result<Self, ConfigError> {
        let defaults = ImageConfig::default();

        let variant_widths = match vars.get("IMAGE_VARIANT_WIDTHS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u32>().map_err(|e| {
                        ConfigError::invalid("IMAGE_VARIANT_WIDTHS", &raw, e.to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.variant_widths,
        };

        Ok(ImageConfig {
            max_dimension: vars
                .parse("IMAGE_MAX_DIMENSION")?
                .unwrap_or(defaults.max_dimension),
            variant_widths,
            jpeg_quality: vars
                .parse("IMAGE_JPEG_QUALITY")?
                .unwrap_or(defaults.jpeg_quality),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dimension == 0 {
            return Err(ConfigError::invalid(
                "IMAGE_MAX_DIMENSION",
                "0",
                "must be greater than zero",
            ));
        }

        if let Some(width) = self.variant_widths.iter().find(|w| **w == 0) {
            return Err(ConfigError::invalid(
                "IMAGE_VARIANT_WIDTHS",
                &width.to_string(),
                "widths must be greater than zero",
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::invalid(
                "IMAGE_JPEG_QUALITY",
                &self.jpeg_quality.to_string(),
                "must be between 1 and 100",
            ));
        }

        Ok(())
    }
}

/// Accepts `1`, `true`, `yes`, `y` and `on` (any case) as true.
pub fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value {
        Some(v) => matches!(
            v.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        None => default,
    }
}

/// Variable source wrapper. Blank values count as unset.
struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn bool(&self, name: &str, default: bool) -> bool {
        parse_bool(self.get(name).as_deref(), default)
    }

    fn parse<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::invalid(name, &raw, e.to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("R2_ACCOUNT_ID", "acc123"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
            ("R2_BUCKET", "photos"),
            ("SUPABASE_URL", "https://proj.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "service"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_match_documented_policy() {
        let config = load(&base_vars()).unwrap();
        let storage = &config.storage;

        assert_eq!(storage.read_source, StorageBackend::Primary);
        assert!(!storage.dual_write_secondary);
        assert!(storage.fallback_to_secondary);
        assert_eq!(storage.primary_write_retries, 1);
        assert_eq!(storage.primary_write_attempts(), 2);
        assert_eq!(storage.primary_retry_backoff, Duration::ZERO);
        assert_eq!(storage.request_timeout, Duration::from_secs(30));
        assert_eq!(storage.secondary.bucket, "photos");
        assert_eq!(config.image, ImageConfig::default());
        assert_eq!(
            storage.primary.endpoint_url().as_deref(),
            Some("https://acc123.r2.cloudflarestorage.com")
        );
    }

    #[test]
    fn invalid_read_source_fails_at_load() {
        let mut vars = base_vars();
        vars.insert("STORAGE_READ_SOURCE", "gcs");

        match load(&vars) {
            Err(ConfigError::Invalid { var, value, .. }) => {
                assert_eq!(var, "STORAGE_READ_SOURCE");
                assert_eq!(value, "gcs");
            }
            other => panic!("expected invalid read source, got {:?}", other),
        }
    }

    #[test]
    fn missing_credentials_fail_fast() {
        for name in [
            "R2_ACCESS_KEY_ID",
            "R2_SECRET_ACCESS_KEY",
            "R2_BUCKET",
            "SUPABASE_URL",
            "SUPABASE_SERVICE_KEY",
        ] {
            let mut vars = base_vars();
            vars.remove(name);
            assert_eq!(load(&vars), Err(ConfigError::Missing(name)));
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut vars = base_vars();
        vars.insert("R2_BUCKET", "   ");
        assert_eq!(load(&vars), Err(ConfigError::Missing("R2_BUCKET")));
    }

    #[test]
    fn account_id_optional_with_explicit_endpoint() {
        let mut vars = base_vars();
        vars.remove("R2_ACCOUNT_ID");
        assert_eq!(load(&vars), Err(ConfigError::Missing("R2_ACCOUNT_ID")));

        vars.insert("R2_ENDPOINT", "http://localhost:9000");
        let config = load(&vars).unwrap();
        assert_eq!(
            config.storage.primary.endpoint_url().as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn negative_or_garbage_retries_rejected() {
        let mut vars = base_vars();
        vars.insert("STORAGE_PRIMARY_WRITE_RETRIES", "-1");
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { .. })));

        vars.insert("STORAGE_PRIMARY_WRITE_RETRIES", "three");
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { .. })));

        vars.insert("STORAGE_PRIMARY_WRITE_RETRIES", "3");
        assert_eq!(load(&vars).unwrap().storage.primary_write_retries, 3);
    }

    #[test]
    fn routing_flags_and_aliases() {
        let mut vars = base_vars();
        vars.insert("STORAGE_READ_SOURCE", "supabase");
        vars.insert("STORAGE_DUAL_WRITE_SECONDARY", "YES");
        vars.insert("STORAGE_FALLBACK_SECONDARY", "off");
        vars.insert("STORAGE_PRIMARY_RETRY_BACKOFF_MS", "250");

        let storage = load(&vars).unwrap().storage;
        assert_eq!(storage.read_source, StorageBackend::Secondary);
        assert!(storage.dual_write_secondary);
        assert!(!storage.fallback_to_secondary);
        assert_eq!(storage.primary_retry_backoff, Duration::from_millis(250));
    }

    #[test]
    fn image_settings_are_validated() {
        let mut vars = base_vars();
        vars.insert("IMAGE_VARIANT_WIDTHS", "320, 640,1280");
        vars.insert("IMAGE_JPEG_QUALITY", "90");
        let image = load(&vars).unwrap().image;
        assert_eq!(image.variant_widths, vec![320, 640, 1280]);
        assert_eq!(image.jpeg_quality, 90);

        vars.insert("IMAGE_JPEG_QUALITY", "0");
        assert!(load(&vars).is_err());

        vars.insert("IMAGE_JPEG_QUALITY", "85");
        vars.insert("IMAGE_VARIANT_WIDTHS", "400,0");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn parse_bool_accepts_common_truthy_values() {
        for v in ["1", "true", "TRUE", "yes", "y", "On"] {
            assert!(parse_bool(Some(v), false), "{} should be true", v);
        }
        for v in ["0", "false", "no", "off", "nope"] {
            assert!(!parse_bool(Some(v), true), "{} should be false", v);
        }
        assert!(parse_bool(None, true));
        assert!(!parse_bool(None, false));
    }
}
