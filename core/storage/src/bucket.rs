//! Bucket-style backend against the Cloud Storage JSON API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::adapter::{
    sort_most_recent_first, stored_file_name, BackendAdapter, DocumentMetadata, FetchedObject,
    VaultRecord, DOCUMENTS_PREFIX,
};
use docvault_common::{BackendKind, Error, Result, VaultAddress};

/// Cloud Storage JSON API base URL.
const STORAGE_API_BASE: &str = "https://storage.googleapis.com/storage/v1";
/// Cloud Storage upload API base URL.
const STORAGE_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Request timeout for storage calls.
const STORAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters that must be escaped when an object name is a URL path segment.
const OBJECT_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'&')
    .add(b'+');

/// Object metadata from the storage API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResource {
    /// Full object name (key).
    pub name: String,
    /// Size in bytes, transmitted as a string.
    #[serde(default)]
    pub size: Option<String>,
    /// Content type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    /// User-provided metadata map.
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl ObjectResource {
    fn size_bytes(&self) -> u64 {
        self.size
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Cloud Storage JSON API client.
pub struct GcsClient {
    http: Client,
    api_base: String,
    upload_base: String,
    access_token: String,
}

impl GcsClient {
    /// Create a client against the production endpoints.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(STORAGE_API_BASE, STORAGE_UPLOAD_BASE, access_token)
    }

    /// Create a client against custom endpoints (tests, emulators).
    pub fn with_base_urls(
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .user_agent("docvault/0.1")
            .timeout(STORAGE_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_base: api_base.into(),
            upload_base: upload_base.into(),
            access_token: access_token.into(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn object_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/b/{}/o/{}",
            self.api_base,
            bucket,
            utf8_percent_encode(object, OBJECT_SEGMENT)
        )
    }

    /// Get object metadata.
    pub async fn get_object(&self, bucket: &str, object: &str) -> Result<ObjectResource> {
        let response = self
            .http
            .get(self.object_url(bucket, object))
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("bucket", format!("get object: {}", e)))?;

        handle_response(response).await
    }

    /// Download object content.
    pub async fn download(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.object_url(bucket, object))
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("bucket", format!("download: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound("Object not found".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::backend_unavailable(
                "bucket",
                format!("download failed: {} - {}", status, body),
            ));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::backend_unavailable("bucket", format!("read body: {}", e)))
    }

    /// Upload an object with metadata via a multipart request.
    pub async fn upload(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        data: &[u8],
        metadata: &BTreeMap<String, String>,
    ) -> Result<ObjectResource> {
        let url = format!("{}/b/{}/o?uploadType=multipart", self.upload_base, bucket);

        let resource = serde_json::json!({
            "name": object,
            "contentType": content_type,
            "metadata": metadata,
        });
        let resource_json = serde_json::to_string(&resource)
            .map_err(|e| Error::Serialization(format!("object resource: {}", e)))?;

        let boundary = "docvault_boundary";
        let mut body = Vec::new();

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(resource_json.as_bytes());
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}--", boundary).as_bytes());

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("bucket", format!("upload: {}", e)))?;

        handle_response(response).await
    }

    /// List objects under a prefix, following pagination.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_results: usize,
    ) -> Result<Vec<ObjectResource>> {
        let mut all_objects = Vec::new();
        let mut page_token: Option<String> = None;
        let url = format!("{}/b/{}/o", self.api_base, bucket);

        loop {
            let mut request = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, self.auth_header())
                .query(&[
                    ("prefix", prefix),
                    ("maxResults", &max_results.to_string()),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::backend_unavailable("bucket", format!("list: {}", e)))?;

            let list: ObjectListResponse = handle_response(response).await?;
            all_objects.extend(list.items);

            if all_objects.len() >= max_results {
                all_objects.truncate(max_results);
                break;
            }

            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_objects)
    }

    /// Delete an object.
    pub async fn delete_object(&self, bucket: &str, object: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.object_url(bucket, object))
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("bucket", format!("delete: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound("Object not found".to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::backend_unavailable(
                "bucket",
                format!("delete failed: {} - {}", status, body),
            ))
        }
    }

    /// Check whether a bucket exists.
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let url = format!("{}/b/{}", self.api_base, bucket);
        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("bucket", format!("get bucket: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::backend_unavailable(
                    "bucket",
                    format!("get bucket failed: {} - {}", status, body),
                ))
            }
        }
    }

    /// Create a bucket with restricted access, uniform bucket-level
    /// access and versioning enabled.
    pub async fn create_bucket(&self, project: &str, bucket: &str) -> Result<()> {
        let url = format!("{}/b?project={}", self.api_base, project);

        let body = serde_json::json!({
            "name": bucket,
            "iamConfiguration": {
                "uniformBucketLevelAccess": { "enabled": true },
                "publicAccessPrevention": "enforced",
            },
            "versioning": { "enabled": true },
        });

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("bucket", format!("create bucket: {}", e)))?;

        let status = response.status();
        // A concurrent bootstrap may have created it first.
        if status.is_success() || status == StatusCode::CONFLICT {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(Error::backend_unavailable(
                "bucket",
                format!("create bucket failed: {} - {}", status, text),
            ))
        }
    }
}

/// Map a storage API response onto the common error taxonomy.
async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::backend_unavailable("bucket", format!("invalid response: {}", e)))
    } else if status == StatusCode::NOT_FOUND {
        Err(Error::NotFound("Object not found".to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::backend_unavailable(
            "bucket",
            format!("API error: {} - {}", status, body),
        ))
    }
}

/// Backend adapter over a Cloud Storage bucket.
///
/// Objects live under `documents/` with the metadata map attached via
/// the bucket's native object metadata.
pub struct BucketAdapter {
    client: GcsClient,
    bucket: String,
    /// Project used to create the bucket when it is missing at bootstrap.
    project: Option<String>,
}

impl BucketAdapter {
    /// Create an adapter for the named bucket.
    pub fn new(client: GcsClient, bucket: impl Into<String>, project: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            project,
        }
    }

    fn check_kind(&self, address: &VaultAddress) -> Result<()> {
        if address.kind() == BackendKind::Bucket {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Address {} targets a different backend",
                address
            )))
        }
    }

    fn to_record(&self, object: &ObjectResource) -> Result<VaultRecord> {
        let metadata = object
            .metadata
            .as_ref()
            .map(DocumentMetadata::from_map)
            .unwrap_or_else(|| DocumentMetadata::from_map(&BTreeMap::new()));

        Ok(VaultRecord {
            address: VaultAddress::new(BackendKind::Bucket, &object.name)?,
            metadata,
            size: object.size_bytes(),
            created: object.time_created,
            updated: object.updated,
        })
    }
}

#[async_trait]
impl BackendAdapter for BucketAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Bucket
    }

    async fn ensure_root(&self) -> Result<()> {
        if self.client.bucket_exists(&self.bucket).await? {
            debug!(bucket = %self.bucket, "Vault bucket already exists");
            return Ok(());
        }

        let project = self.project.as_deref().ok_or_else(|| {
            Error::Configuration(format!(
                "Vault bucket '{}' does not exist and no project is configured to create it",
                self.bucket
            ))
        })?;

        self.client.create_bucket(project, &self.bucket).await?;
        info!(bucket = %self.bucket, "Created vault bucket");
        Ok(())
    }

    async fn put(
        &self,
        source_id: &str,
        name: &str,
        bytes: Vec<u8>,
        metadata: &DocumentMetadata,
    ) -> Result<VaultAddress> {
        let object = format!(
            "{}{}",
            DOCUMENTS_PREFIX,
            stored_file_name(source_id, name, metadata.stored_at)
        );

        self.client
            .upload(
                &self.bucket,
                &object,
                &metadata.content_type,
                &bytes,
                &metadata.to_map(),
            )
            .await?;

        info!(object = %object, "Document stored in bucket vault");
        VaultAddress::new(BackendKind::Bucket, object)
    }

    async fn get(&self, address: &VaultAddress) -> Result<FetchedObject> {
        self.check_kind(address)?;

        let object = self.client.get_object(&self.bucket, address.path()).await?;
        let content = self.client.download(&self.bucket, address.path()).await?;

        Ok(FetchedObject {
            content,
            record: self.to_record(&object)?,
        })
    }

    async fn list(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<VaultRecord>> {
        let prefix = prefix.unwrap_or(DOCUMENTS_PREFIX);
        let objects = self.client.list_objects(&self.bucket, prefix, limit).await?;

        let mut records = Vec::with_capacity(objects.len());
        for object in &objects {
            records.push(self.to_record(object)?);
        }

        sort_most_recent_first(&mut records);
        Ok(records)
    }

    async fn delete(&self, address: &VaultAddress) -> Result<()> {
        self.check_kind(address)?;
        self.client.delete_object(&self.bucket, address.path()).await?;
        info!(address = %address, "Document deleted from bucket vault");
        Ok(())
    }

    async fn exists(&self, address: &VaultAddress) -> Result<bool> {
        self.check_kind(address)?;
        match self.client.get_object(&self.bucket, address.path()).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
