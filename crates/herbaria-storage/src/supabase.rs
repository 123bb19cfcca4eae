use crate::keys::{join_public_url, normalize_base_url, validate_key};
use crate::traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use herbaria_core::SecondaryBackendConfig;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

const LIST_PAGE_SIZE: usize = 1000;
const FOLDER_PLACEHOLDER: &str = ".emptyFolderPlaceholder";

/// Entry of a folder listing. Folders carry neither an id nor metadata.
#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    metadata: Option<EntryMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct EntryMetadata {
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default, rename = "cacheControl")]
    cache_control: Option<String>,
}

/// Secondary backend: Supabase Storage REST API.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    project_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(config: &SecondaryBackendConfig, request_timeout: Duration) -> StorageResult<Self> {
        if config.url.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "SUPABASE_URL not configured".to_string(),
            ));
        }
        if config.service_key.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "SUPABASE_SERVICE_KEY not configured".to_string(),
            ));
        }
        if config.bucket.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "SUPABASE_STORAGE_BUCKET is empty".to_string(),
            ));
        }

        let project_url = normalize_base_url(&config.url);
        reqwest::Url::parse(&project_url).map_err(|e| {
            StorageError::ConfigError(format!("Invalid SUPABASE_URL {}: {}", project_url, e))
        })?;

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            project_url = %project_url,
            bucket = %config.bucket,
            timeout_secs = request_timeout.as_secs(),
            "Supabase storage configured"
        );

        Ok(SupabaseStorage {
            client,
            project_url,
            service_key: config.service_key.clone(),
            bucket: config.bucket.trim().to_string(),
        })
    }

    /// Base under which public objects of the bucket are served.
    pub fn public_base_url(&self) -> String {
        format!(
            "{}/storage/v1/object/public/{}",
            self.project_url, self.bucket
        )
    }

    fn object_url(&self, key: &str) -> String {
        join_public_url(
            &format!("{}/storage/v1/object/{}", self.project_url, self.bucket),
            key,
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
            .header("apikey", &self.service_key)
    }

    async fn list_folder(&self, folder: &str, offset: usize) -> StorageResult<Vec<ListEntry>> {
        let url = format!(
            "{}/storage/v1/object/list/{}",
            self.project_url, self.bucket
        );
        let body = serde_json::json!({
            "prefix": folder,
            "limit": LIST_PAGE_SIZE,
            "offset": offset,
            "sortBy": { "column": "name", "order": "asc" },
        });

        let response = self
            .authorized(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::BackendError(
                Self::error_text(response).await,
            ));
        }

        response
            .json::<Vec<ListEntry>>()
            .await
            .map_err(|e| StorageError::BackendError(format!("Invalid listing: {}", e)))
    }

    async fn error_text(response: Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("HTTP {}: {}", status, body)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        validate_key(key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let mut request = self
            .authorized(self.client.post(self.object_url(key)))
            .header("x-upsert", "true")
            .header(
                CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            );
        if let Some(cache_control) = cache_control {
            request = request.header(CACHE_CONTROL, cache_control);
        }

        let response = request.body(data).send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                "Supabase upload request failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        if !response.status().is_success() {
            let message = Self::error_text(response).await;
            tracing::error!(
                error = %message,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                "Supabase upload rejected"
            );
            return Err(StorageError::UploadFailed(message));
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Supabase upload successful"
        );

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let url = format!("{}/storage/v1/object/{}", self.project_url, self.bucket);
        let body = serde_json::json!({ "prefixes": [key.trim_start_matches('/')] });

        let response = self
            .authorized(self.client.delete(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        if !response.status().is_success() {
            let message = Self::error_text(response).await;
            tracing::error!(
                error = %message,
                bucket = %self.bucket,
                key = %key,
                "Supabase delete rejected"
            );
            return Err(StorageError::DeleteFailed(message));
        }

        tracing::info!(bucket = %self.bucket, key = %key, "Supabase delete successful");
        Ok(())
    }

    async fn download_object(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;

        let response = self
            .authorized(self.client.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(key.to_string())),
            _ => {
                return Err(StorageError::DownloadFailed(
                    Self::error_text(response).await,
                ))
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len() as u64,
            "Supabase download successful"
        );

        Ok(bytes)
    }

    /// Walks folders breadth-first, one page of `LIST_PAGE_SIZE` at a time.
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let root = prefix.trim_matches('/').to_string();
        let mut visited = HashSet::from([root.clone()]);
        let mut folders = VecDeque::from([root]);
        let mut objects = Vec::new();

        while let Some(folder) = folders.pop_front() {
            let mut offset = 0;
            loop {
                let entries = self.list_folder(&folder, offset).await?;
                let count = entries.len();

                for entry in entries {
                    if entry.name.is_empty() || entry.name == FOLDER_PLACEHOLDER {
                        continue;
                    }
                    let path = if folder.is_empty() {
                        entry.name
                    } else {
                        format!("{}/{}", folder, entry.name)
                    };

                    if entry.id.is_some() || entry.metadata.is_some() {
                        let metadata = entry.metadata.unwrap_or_default();
                        objects.push(ObjectInfo {
                            key: path,
                            size_bytes: metadata.size,
                            content_type: metadata.mimetype,
                            cache_control: metadata.cache_control,
                        });
                    } else if visited.insert(path.clone()) {
                        folders.push_back(path);
                    }
                }

                offset += count;
                if count < LIST_PAGE_SIZE {
                    break;
                }
            }
        }

        tracing::debug!(
            bucket = %self.bucket,
            prefix = %prefix,
            objects = objects.len(),
            "Supabase listing complete"
        );

        Ok(objects)
    }

    fn get_public_url(&self, key: &str) -> StorageResult<String> {
        Ok(join_public_url(&self.public_base_url(), key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn config(url: &str) -> SecondaryBackendConfig {
        SecondaryBackendConfig {
            url: url.to_string(),
            service_key: "service-key".to_string(),
            bucket: "photos".to_string(),
        }
    }

    fn storage(url: &str) -> SupabaseStorage {
        SupabaseStorage::new(&config(url), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn upload_posts_with_upsert_and_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/photos/original/species/1/a.jpg")
            .match_header("authorization", "Bearer service-key")
            .match_header("apikey", "service-key")
            .match_header("x-upsert", "true")
            .match_header("content-type", "image/jpeg")
            .match_header("cache-control", "public, max-age=31536000, immutable")
            .match_body(Matcher::Exact("jpeg bytes".to_string()))
            .with_status(200)
            .with_body(r#"{"Key":"photos/original/species/1/a.jpg"}"#)
            .create_async()
            .await;

        storage(&server.url())
            .upload_object(
                "original/species/1/a.jpg",
                Bytes::from_static(b"jpeg bytes"),
                Some("image/jpeg"),
                Some("public, max-age=31536000, immutable"),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upload_error_status_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/storage/v1/object/photos/original/a.jpg")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = storage(&server.url())
            .upload_object("original/a.jpg", Bytes::from_static(b"x"), None, None)
            .await
            .unwrap_err();

        match err {
            StorageError::UploadFailed(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn delete_sends_prefix_list() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/storage/v1/object/photos")
            .match_header("authorization", "Bearer service-key")
            .match_body(Matcher::Json(
                serde_json::json!({ "prefixes": ["original/species/1/a.jpg"] }),
            ))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        storage(&server.url())
            .delete_object("original/species/1/a.jpg")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn download_maps_not_found() {
        let mut server = Server::new_async().await;
        let _found = server
            .mock("GET", "/storage/v1/object/photos/original/a.jpg")
            .match_header("apikey", "service-key")
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/storage/v1/object/photos/original/missing.jpg")
            .with_status(404)
            .create_async()
            .await;

        let storage = storage(&server.url());
        assert_eq!(
            storage.download_object("original/a.jpg").await.unwrap(),
            Bytes::from_static(b"payload")
        );
        assert!(matches!(
            storage.download_object("original/missing.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_walks_folders_and_keeps_metadata() {
        let mut server = Server::new_async().await;
        let root = server
            .mock("POST", "/storage/v1/object/list/photos")
            .match_header("authorization", "Bearer service-key")
            .match_body(Matcher::PartialJson(
                serde_json::json!({ "prefix": "original", "offset": 0 }),
            ))
            .with_status(200)
            .with_body(
                r#"[
                    {"name": "species", "id": null, "metadata": null},
                    {"name": "a.png", "id": "1", "metadata": {"size": 10, "mimetype": "image/png", "cacheControl": "max-age=3600"}}
                ]"#,
            )
            .create_async()
            .await;
        let nested = server
            .mock("POST", "/storage/v1/object/list/photos")
            .match_body(Matcher::PartialJson(
                serde_json::json!({ "prefix": "original/species", "offset": 0 }),
            ))
            .with_status(200)
            .with_body(
                r#"[
                    {"name": ".emptyFolderPlaceholder", "id": "2", "metadata": {"size": 0}},
                    {"name": "b.jpg", "id": "3", "metadata": {"size": 4, "mimetype": "image/jpeg"}}
                ]"#,
            )
            .create_async()
            .await;

        let objects = storage(&server.url())
            .list_objects("/original/")
            .await
            .unwrap();

        assert_eq!(
            objects,
            vec![
                ObjectInfo {
                    key: "original/a.png".to_string(),
                    size_bytes: Some(10),
                    content_type: Some("image/png".to_string()),
                    cache_control: Some("max-age=3600".to_string()),
                },
                ObjectInfo {
                    key: "original/species/b.jpg".to_string(),
                    size_bytes: Some(4),
                    content_type: Some("image/jpeg".to_string()),
                    cache_control: None,
                },
            ]
        );
        root.assert_async().await;
        nested.assert_async().await;
    }

    #[tokio::test]
    async fn listing_error_status_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/storage/v1/object/list/photos")
            .with_status(403)
            .with_body("denied")
            .create_async()
            .await;

        let result = storage(&server.url()).list_objects("").await;
        assert!(matches!(result, Err(StorageError::BackendError(message)) if message.contains("403")));
    }

    #[test]
    fn public_url_layout() {
        let storage = storage("proj.supabase.co/");
        assert_eq!(
            storage.get_public_url("/w=400/species/1/a.jpg").unwrap(),
            "https://proj.supabase.co/storage/v1/object/public/photos/w=400/species/1/a.jpg"
        );
        assert!(!storage.should_use_signed_urls());
        assert_eq!(storage.backend_type(), StorageBackend::Secondary);
    }

    #[tokio::test]
    async fn signing_is_unsupported() {
        let result = storage("https://proj.supabase.co")
            .get_signed_url("original/a.jpg", Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(StorageError::Unsupported(_))));
    }

    #[test]
    fn construction_requires_url_and_key() {
        let mut missing_key = config("https://proj.supabase.co");
        missing_key.service_key = String::new();
        assert!(matches!(
            SupabaseStorage::new(&missing_key, Duration::from_secs(5)),
            Err(StorageError::ConfigError(_))
        ));
        assert!(matches!(
            SupabaseStorage::new(&config("  "), Duration::from_secs(5)),
            Err(StorageError::ConfigError(_))
        ));
    }
}
