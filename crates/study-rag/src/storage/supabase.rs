//! Supabase Storage blob store
//!
//! Talks to the Storage REST API with the service role key. Object paths are
//! percent-encoded segment by segment.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SupabaseConfig;
use crate::error::{Error, Result};

use super::blob::{BlobEntry, BlobStore, WriteMode, WriteOutcome};

/// Entries requested per list call
const LIST_PAGE_SIZE: usize = 1000;

/// Supabase Storage client for one bucket
pub struct SupabaseBlobStore {
    client: Client,
    base_url: Url,
    service_key: String,
    bucket: String,
    signed_url_expiry_secs: u64,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    #[serde(rename = "sortBy")]
    sort_by: SortBy,
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

#[derive(Deserialize)]
struct ListedObject {
    name: String,
    /// Null for folder placeholders
    id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    metadata: Option<ObjectMetadata>,
}

#[derive(Deserialize)]
struct ObjectMetadata {
    size: Option<u64>,
}

#[derive(Serialize)]
struct SignRequest {
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseBlobStore {
    /// Create a new Supabase store
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid Supabase URL '{}': {}", config.url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            service_key: config.service_key.clone(),
            bucket: config.bucket.clone(),
            signed_url_expiry_secs: config.signed_url_expiry_secs,
        })
    }

    /// Build `{base}/storage/v1/{op...}/{bucket}/{path...}`
    fn object_url(&self, op: &[&str], path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config("Supabase URL cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.extend(["storage", "v1"]);
            segments.extend(op);
            segments.push(&self.bucket);
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn list_page(&self, prefix: &str, offset: usize) -> Result<Vec<ListedObject>> {
        let url = self.object_url(&["object", "list"], "")?;
        let body = ListRequest {
            prefix,
            limit: LIST_PAGE_SIZE,
            offset,
            sort_by: SortBy { column: "name", order: "asc" },
        };

        let response = self
            .authorized(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::storage(format!("List request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::storage(format!("List failed: HTTP {} - {}", status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::storage(format!("Failed to parse list response: {}", e)))
    }
}

/// Supabase reports some conflicts and misses as 400 with the real code in the body
fn body_mentions(text: &str, needles: &[&str]) -> bool {
    let lower = text.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>> {
        let prefix = prefix.trim_matches('/');
        let mut entries = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.list_page(prefix, offset).await?;
            let page_len = page.len();

            entries.extend(page.into_iter().map(|object| BlobEntry {
                is_dir: object.id.is_none(),
                size: object.metadata.and_then(|m| m.size),
                created_at: object.created_at,
                name: object.name,
            }));

            if page_len < LIST_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        Ok(entries)
    }

    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        mode: WriteMode,
    ) -> Result<WriteOutcome> {
        let url = self.object_url(&["object"], path)?;
        let upsert = matches!(mode, WriteMode::Overwrite);

        let response = self
            .authorized(self.client.post(url))
            .header("content-type", content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(data)
            .send()
            .await
            .map_err(|e| Error::storage(format!("Upload of {} failed: {}", path, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(WriteOutcome::Written);
        }

        let text = response.text().await.unwrap_or_default();
        let conflict = status == StatusCode::CONFLICT
            || (status == StatusCode::BAD_REQUEST && body_mentions(&text, &["duplicate", "already exists", "409"]));
        if !upsert && conflict {
            return Ok(WriteOutcome::AlreadyExists);
        }

        Err(Error::storage(format!("Upload of {} failed: HTTP {} - {}", path, status, text)))
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let url = self.object_url(&["object"], path)?;

        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| Error::storage(format!("Download of {} failed: {}", path, e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .bytes()
                .await
                .map_err(|e| Error::storage(format!("Failed to read {}: {}", path, e)));
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND
            || (status == StatusCode::BAD_REQUEST && body_mentions(&text, &["not_found", "not found", "404"]))
        {
            return Err(Error::not_found(format!("Blob not found: {}", path)));
        }

        Err(Error::storage(format!("Download of {} failed: HTTP {} - {}", path, status, text)))
    }

    async fn access_url(&self, path: &str) -> Result<String> {
        let url = self.object_url(&["object", "sign"], path)?;

        let response = self
            .authorized(self.client.post(url))
            .json(&SignRequest { expires_in: self.signed_url_expiry_secs })
            .send()
            .await
            .map_err(|e| Error::storage(format!("Signing {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::storage(format!("Signing {} failed: HTTP {} - {}", path, status, text)));
        }

        let signed: SignResponse = response
            .json()
            .await
            .map_err(|e| Error::storage(format!("Failed to parse signed URL: {}", e)))?;

        Ok(format!(
            "{}/storage/v1{}",
            self.base_url.as_str().trim_end_matches('/'),
            signed.signed_url
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = self.object_url(&["bucket"], "")?;
        match self.authorized(self.client.get(url)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "supabase-storage"
    }
}
