//! Helpers shared by the `herbaria` binary.

use std::path::Path;

use herbaria_core::Config;
use herbaria_storage::{ObjectInfo, StorageRouter};
use serde::Serialize;
use serde_json::{json, Value};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("herbaria=info")),
        )
        .init();
}

/// Content type for a local photo file, from its extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Configuration overview with every secret left out.
pub fn config_summary(config: &Config) -> Value {
    let storage = &config.storage;
    json!({
        "storage": {
            "read_source": storage.read_source.to_string(),
            "dual_write_secondary": storage.dual_write_secondary,
            "fallback_to_secondary": storage.fallback_to_secondary,
            "primary_write_attempts": storage.primary_write_attempts(),
            "primary_retry_backoff_ms": storage.primary_retry_backoff.as_millis() as u64,
            "request_timeout_secs": storage.request_timeout.as_secs(),
            "primary": {
                "endpoint": storage.primary.endpoint_url(),
                "bucket": storage.primary.bucket,
                "public_base_url": storage.primary.public_base_url,
                "signed_urls": storage.primary.public_base_url.is_none(),
            },
            "secondary": {
                "url": storage.secondary.url,
                "bucket": storage.secondary.bucket,
            },
        },
        "image": {
            "max_dimension": config.image.max_dimension,
            "variant_widths": config.image.variant_widths,
            "jpeg_quality": config.image.jpeg_quality,
        },
    })
}

/// One key the migration could not copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of a migration run. A dry run only fills `planned`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<String>,
    pub migrated: Vec<String>,
    pub bytes_copied: u64,
    pub failed: Vec<MigrationFailure>,
}

/// Copy every source object to the primary, collecting per-key failures.
pub async fn run_migration(
    router: &StorageRouter,
    sources: Vec<ObjectInfo>,
    dry_run: bool,
) -> MigrationReport {
    let mut report = MigrationReport {
        dry_run,
        ..Default::default()
    };

    for source in sources {
        if dry_run {
            tracing::info!(key = %source.key, "Would migrate");
            report.planned.push(source.key);
            continue;
        }

        match router.migrate_object(&source).await {
            Ok(migrated) => {
                report.bytes_copied += migrated.size_bytes;
                report.migrated.push(migrated.key);
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %source.key, "Migration failed");
                report.failed.push(MigrationFailure {
                    key: source.key,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        dry_run,
        planned = report.planned.len(),
        migrated = report.migrated.len(),
        failed = report.failed.len(),
        bytes_copied = report.bytes_copied,
        "Migration finished"
    );

    report
}

/// Keys listed one per line; blank lines and `#` comments are ignored.
pub fn parse_key_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use herbaria_storage::{MemoryStorage, RoutingPolicy};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("a/leaf.JPG")), "image/jpeg");
        assert_eq!(content_type_for_path(Path::new("leaf.png")), "image/png");
        assert_eq!(
            content_type_for_path(Path::new("notes")),
            "application/octet-stream"
        );
    }

    #[test]
    fn summary_omits_secrets() {
        let vars: HashMap<&str, &str> = [
            ("R2_ACCOUNT_ID", "acc123"),
            ("R2_ACCESS_KEY_ID", "access-id"),
            ("R2_SECRET_ACCESS_KEY", "top-secret"),
            ("R2_BUCKET", "photos"),
            ("SUPABASE_URL", "https://proj.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "service-secret"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        let summary = config_summary(&config);
        let text = summary.to_string();

        assert!(!text.contains("top-secret"));
        assert!(!text.contains("service-secret"));
        assert!(!text.contains("access-id"));
        assert_eq!(summary["storage"]["read_source"], "primary");
        assert_eq!(summary["storage"]["primary"]["signed_urls"], true);
        assert_eq!(
            summary["storage"]["primary"]["endpoint"],
            "https://acc123.r2.cloudflarestorage.com"
        );
    }

    fn router() -> (Arc<MemoryStorage>, Arc<MemoryStorage>, StorageRouter) {
        let primary = Arc::new(MemoryStorage::primary());
        let secondary = Arc::new(MemoryStorage::secondary());
        let router = StorageRouter::new(primary.clone(), secondary.clone(), RoutingPolicy::default());
        (primary, secondary, router)
    }

    #[tokio::test]
    async fn migration_copies_listed_objects_and_reports_failures() {
        let (primary, secondary, router) = router();
        secondary.insert("original/species/1/a.jpg", &b"aaaa"[..]);
        secondary.insert("original/species/1/b.jpg", &b"bb"[..]);

        let mut sources = router.list_secondary_objects("original/").await.unwrap();
        sources.push(ObjectInfo::from_key("original/species/1/missing.jpg"));

        let report = run_migration(&router, sources, false).await;

        assert_eq!(
            report.migrated,
            vec!["original/species/1/a.jpg", "original/species/1/b.jpg"]
        );
        assert_eq!(report.bytes_copied, 6);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, "original/species/1/missing.jpg");
        assert_eq!(primary.object_count(), 2);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let (primary, secondary, router) = router();
        secondary.insert("w=400/species/1/a.jpg", &b"aaaa"[..]);

        let sources = router.list_secondary_objects("").await.unwrap();
        let report = run_migration(&router, sources, true).await;

        assert!(report.dry_run);
        assert_eq!(report.planned, vec!["w=400/species/1/a.jpg"]);
        assert!(report.migrated.is_empty());
        assert_eq!(primary.upload_attempts(), 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["planned"][0], "w=400/species/1/a.jpg");
    }

    #[test]
    fn key_list_skips_blanks_and_comments() {
        let keys = parse_key_list("original/a.jpg\n\n# done\n  w=400/a.jpg  \n");
        assert_eq!(keys, vec!["original/a.jpg", "w=400/a.jpg"]);
    }
}
