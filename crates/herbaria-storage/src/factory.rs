use crate::router::{RoutingPolicy, StorageRouter};
use crate::{ObjectStorage, S3Storage, StorageResult, SupabaseStorage};
use herbaria_core::StorageConfig;
use std::sync::Arc;

/// Create both backend adapters from configuration
///
/// Fails on the first missing or malformed credential; no adapter is built
/// in a degraded state.
pub fn create_backends(
    config: &StorageConfig,
) -> StorageResult<(Arc<dyn ObjectStorage>, Arc<dyn ObjectStorage>)> {
    let primary = S3Storage::new(&config.primary, config.request_timeout)?;
    let secondary = SupabaseStorage::new(&config.secondary, config.request_timeout)?;
    Ok((Arc::new(primary), Arc::new(secondary)))
}

/// Create the storage router based on configuration
pub fn create_router(config: &StorageConfig) -> StorageResult<StorageRouter> {
    let (primary, secondary) = create_backends(config)?;
    let policy = RoutingPolicy::from(config);

    tracing::info!(
        read_source = %policy.read_source,
        dual_write_secondary = policy.dual_write_secondary,
        fallback_to_secondary = policy.fallback_to_secondary,
        primary_write_attempts = policy.primary_write_attempts(),
        backoff_ms = policy.primary_retry_backoff.as_millis() as u64,
        "Storage router initialized"
    );

    Ok(StorageRouter::new(primary, secondary, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageBackend;
    use herbaria_core::{PrimaryBackendConfig, SecondaryBackendConfig};
    use std::time::Duration;

    fn config() -> StorageConfig {
        StorageConfig {
            read_source: StorageBackend::Secondary,
            dual_write_secondary: true,
            fallback_to_secondary: false,
            primary_write_retries: 3,
            primary_retry_backoff: Duration::from_millis(250),
            request_timeout: Duration::from_secs(10),
            primary: PrimaryBackendConfig {
                account_id: Some("acc123".to_string()),
                access_key_id: "key".to_string(),
                secret_access_key: "secret".to_string(),
                bucket: "photos".to_string(),
                endpoint: None,
                public_base_url: Some("https://cdn.example.com".to_string()),
            },
            secondary: SecondaryBackendConfig {
                url: "https://proj.supabase.co".to_string(),
                service_key: "service-key".to_string(),
                bucket: "photos".to_string(),
            },
        }
    }

    #[test]
    fn router_carries_policy_from_config() {
        let router = create_router(&config()).unwrap();
        let policy = router.policy();

        assert_eq!(policy.read_source, StorageBackend::Secondary);
        assert!(policy.dual_write_secondary);
        assert!(!policy.fallback_to_secondary);
        assert_eq!(policy.primary_write_attempts(), 4);
        assert_eq!(router.primary().backend_type(), StorageBackend::Primary);
        assert_eq!(router.secondary().backend_type(), StorageBackend::Secondary);
        assert_eq!(
            router.get_public_url("original/a.jpg").unwrap(),
            "https://proj.supabase.co/storage/v1/object/public/photos/original/a.jpg"
        );
    }

    #[test]
    fn missing_secondary_credentials_fail_construction() {
        let mut config = config();
        config.secondary.service_key = String::new();
        assert!(create_router(&config).is_err());
    }
}
