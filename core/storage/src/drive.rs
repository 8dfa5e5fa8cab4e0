//! Folder-style backend against the Drive v3 API.
//!
//! Documents are files inside a dedicated vault folder; the metadata
//! map rides in each file's `appProperties`. Addresses carry the
//! folder id and file name (`drive://<folder_id>/<name>`), so lookup is
//! name-based within the parent folder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapter::{
    sort_most_recent_first, stored_file_name, BackendAdapter, DocumentMetadata, FetchedObject,
    VaultRecord,
};
use docvault_common::{BackendKind, Error, Result, VaultAddress};

/// Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Request timeout for drive calls.
const DRIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// MIME type marking a folder.
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// File fields requested on every call.
const FILE_FIELDS: &str =
    "id,name,mimeType,size,createdTime,modifiedTime,parents,appProperties,trashed";

/// Drive file metadata from the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub app_properties: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    fn size_bytes(&self) -> u64 {
        self.size
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Permission {
    id: String,
    #[serde(rename = "type")]
    grantee_type: String,
}

#[derive(Debug, Deserialize)]
struct PermissionListResponse {
    #[serde(default)]
    permissions: Vec<Permission>,
}

/// Drive v3 API client.
pub struct DriveClient {
    http: Client,
    api_base: String,
    upload_base: String,
    access_token: String,
}

impl DriveClient {
    /// Create a client against the production endpoints.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(DRIVE_API_BASE, DRIVE_UPLOAD_BASE, access_token)
    }

    /// Create a client against custom endpoints (tests, emulators).
    pub fn with_base_urls(
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .user_agent("docvault/0.1")
            .timeout(DRIVE_TIMEOUT)
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

    /// Get file metadata by id.
    pub async fn get_file(&self, file_id: &str) -> Result<DriveFile> {
        let url = format!("{}/files/{}", self.api_base, file_id);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("get file: {}", e)))?;

        handle_response(response).await
    }

    /// Find a file by name within a folder.
    pub async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<DriveFile>> {
        let url = format!("{}/files", self.api_base);
        let query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            name.replace('\'', "\\'"),
            parent_id
        );

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&[
                ("q", query.as_str()),
                ("fields", &format!("files({})", FILE_FIELDS)),
                ("pageSize", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("find file: {}", e)))?;

        let list: FileListResponse = handle_response(response).await?;
        Ok(list.files.into_iter().next())
    }

    /// Find a folder by name anywhere the caller can see.
    pub async fn find_folder(&self, name: &str) -> Result<Option<DriveFile>> {
        let url = format!("{}/files", self.api_base);
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            name.replace('\'', "\\'"),
            FOLDER_MIME_TYPE
        );

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&[
                ("q", query.as_str()),
                ("fields", &format!("files({})", FILE_FIELDS)),
                ("pageSize", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("find folder: {}", e)))?;

        let list: FileListResponse = handle_response(response).await?;
        Ok(list.files.into_iter().next())
    }

    /// List files in a folder, most recently modified first.
    pub async fn list_folder(&self, folder_id: &str, max_results: usize) -> Result<Vec<DriveFile>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let url = format!("{}/files", self.api_base);
        let query = format!("'{}' in parents and trashed = false", folder_id);

        loop {
            let mut request = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, self.auth_header())
                .query(&[
                    ("q", query.as_str()),
                    (
                        "fields",
                        &format!("files({}),nextPageToken", FILE_FIELDS),
                    ),
                    ("orderBy", "modifiedTime desc"),
                    ("pageSize", "1000"),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::backend_unavailable("drive", format!("list folder: {}", e)))?;

            let list: FileListResponse = handle_response(response).await?;
            all_files.extend(list.files);

            if all_files.len() >= max_results {
                all_files.truncate(max_results);
                break;
            }

            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Upload a file into a folder with `appProperties` metadata.
    pub async fn upload(
        &self,
        name: &str,
        parent_id: &str,
        content_type: &str,
        data: &[u8],
        app_properties: &BTreeMap<String, String>,
    ) -> Result<DriveFile> {
        let url = format!("{}/files?uploadType=multipart", self.upload_base);

        let file_metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id],
            "mimeType": content_type,
            "appProperties": app_properties,
        });
        let metadata_json = serde_json::to_string(&file_metadata)
            .map_err(|e| Error::Serialization(format!("file metadata: {}", e)))?;

        let boundary = "docvault_boundary";
        let mut body = Vec::new();

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata_json.as_bytes());
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
            .query(&[("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("upload: {}", e)))?;

        handle_response(response).await
    }

    /// Download file content.
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}", self.api_base, file_id);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("download: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound("File not found".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::backend_unavailable(
                "drive",
                format!("download failed: {} - {}", status, body),
            ));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::backend_unavailable("drive", format!("read body: {}", e)))
    }

    /// Delete a file.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", self.api_base, file_id);

        let response = self
            .http
            .delete(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("delete: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound("File not found".to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::backend_unavailable(
                "drive",
                format!("delete failed: {} - {}", status, body),
            ))
        }
    }

    /// Create a folder.
    pub async fn create_folder(&self, name: &str, description: &str) -> Result<DriveFile> {
        let url = format!("{}/files", self.api_base);

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "description": description,
        });

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("create folder: {}", e)))?;

        handle_response(response).await
    }

    /// Remove any `anyone` permission entries from a file or folder.
    pub async fn remove_public_access(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}/permissions", self.api_base, file_id);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("list permissions: {}", e)))?;

        let list: PermissionListResponse = handle_response(response).await?;

        for permission in list
            .permissions
            .iter()
            .filter(|p| p.grantee_type == "anyone")
        {
            let delete_url = format!(
                "{}/files/{}/permissions/{}",
                self.api_base, file_id, permission.id
            );
            let response = self
                .http
                .delete(&delete_url)
                .header(header::AUTHORIZATION, self.auth_header())
                .send()
                .await
                .map_err(|e| {
                    Error::backend_unavailable("drive", format!("delete permission: {}", e))
                })?;

            if !response.status().is_success() {
                let status = response.status();
                return Err(Error::backend_unavailable(
                    "drive",
                    format!("delete permission failed: {}", status),
                ));
            }
        }

        Ok(())
    }
}

/// Map a drive API response onto the common error taxonomy.
async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::backend_unavailable("drive", format!("invalid response: {}", e)))
    } else if status == StatusCode::NOT_FOUND {
        Err(Error::NotFound("Resource not found".to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::backend_unavailable(
            "drive",
            format!("API error: {} - {}", status, body),
        ))
    }
}

/// Configuration for the drive adapter.
#[derive(Debug, Clone)]
pub struct DriveAdapterConfig {
    /// Known vault folder id; resolved by name when absent.
    pub folder_id: Option<String>,
    /// Folder name used for lookup/creation when no id is configured.
    pub folder_name: String,
}

/// Backend adapter over a restricted Drive folder.
pub struct DriveAdapter {
    client: DriveClient,
    config: DriveAdapterConfig,
    /// Resolved vault folder id, cached after bootstrap.
    folder_id: RwLock<Option<String>>,
}

impl DriveAdapter {
    /// Create an adapter; the root folder resolves at bootstrap.
    pub fn new(client: DriveClient, config: DriveAdapterConfig) -> Self {
        let folder_id = RwLock::new(config.folder_id.clone());
        Self {
            client,
            config,
            folder_id,
        }
    }

    fn check_kind(&self, address: &VaultAddress) -> Result<()> {
        if address.kind() == BackendKind::Drive {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Address {} targets a different backend",
                address
            )))
        }
    }

    /// Split a drive address path into `(folder_id, file_name)`.
    fn split_address(address: &VaultAddress) -> Result<(&str, &str)> {
        address.path().split_once('/').ok_or_else(|| {
            Error::Format(format!(
                "Drive address must be drive://<folder_id>/<name>: {}",
                address
            ))
        })
    }

    /// Resolved root folder id, bootstrapping on first use.
    async fn root_folder(&self) -> Result<String> {
        if let Some(id) = self.folder_id.read().await.clone() {
            return Ok(id);
        }
        self.ensure_root().await?;
        self.folder_id
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Configuration("Drive vault folder not resolved".to_string()))
    }

    fn to_record(&self, folder_id: &str, file: &DriveFile) -> Result<VaultRecord> {
        let metadata = file
            .app_properties
            .as_ref()
            .map(DocumentMetadata::from_map)
            .unwrap_or_else(|| DocumentMetadata::from_map(&BTreeMap::new()));

        Ok(VaultRecord {
            address: VaultAddress::new(
                BackendKind::Drive,
                format!("{}/{}", folder_id, file.name),
            )?,
            metadata,
            size: file.size_bytes(),
            created: file.created_time,
            updated: file.modified_time,
        })
    }
}

#[async_trait]
impl BackendAdapter for DriveAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Drive
    }

    async fn ensure_root(&self) -> Result<()> {
        // Configured id wins; verify it still resolves.
        if let Some(id) = self.folder_id.read().await.clone() {
            match self.client.get_file(&id).await {
                Ok(folder) if folder.is_folder() => {
                    debug!(folder_id = %id, "Drive vault folder verified");
                    return Ok(());
                }
                Ok(_) => {
                    return Err(Error::Configuration(format!(
                        "Configured drive vault id '{}' is not a folder",
                        id
                    )))
                }
                Err(Error::NotFound(_)) => {
                    warn!(folder_id = %id, "Configured drive vault folder not found, recreating");
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(existing) = self.client.find_folder(&self.config.folder_name).await? {
            *self.folder_id.write().await = Some(existing.id.clone());
            debug!(folder_id = %existing.id, "Found existing drive vault folder");
            return Ok(());
        }

        let folder = self
            .client
            .create_folder(
                &self.config.folder_name,
                "Encrypted secure vault for sensitive documents",
            )
            .await?;
        self.client.remove_public_access(&folder.id).await?;
        info!(folder_id = %folder.id, name = %folder.name, "Created drive vault folder");

        *self.folder_id.write().await = Some(folder.id);
        Ok(())
    }

    async fn put(
        &self,
        source_id: &str,
        name: &str,
        bytes: Vec<u8>,
        metadata: &DocumentMetadata,
    ) -> Result<VaultAddress> {
        let folder_id = self.root_folder().await?;
        let file_name = stored_file_name(source_id, name, metadata.stored_at);

        self.client
            .upload(
                &file_name,
                &folder_id,
                &metadata.content_type,
                &bytes,
                &metadata.to_map(),
            )
            .await?;

        info!(file = %file_name, "Document stored in drive vault");
        VaultAddress::new(BackendKind::Drive, format!("{}/{}", folder_id, file_name))
    }

    async fn get(&self, address: &VaultAddress) -> Result<FetchedObject> {
        self.check_kind(address)?;
        let (folder_id, file_name) = Self::split_address(address)?;

        let file = self
            .client
            .find_file(file_name, folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Document not found in vault: {}", address)))?;

        let content = self.client.download(&file.id).await?;

        Ok(FetchedObject {
            content,
            record: self.to_record(folder_id, &file)?,
        })
    }

    async fn list(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<VaultRecord>> {
        let folder_id = self.root_folder().await?;
        let files = self.client.list_folder(&folder_id, limit).await?;

        let mut records = Vec::with_capacity(files.len());
        for file in &files {
            if let Some(prefix) = prefix {
                if !file.name.starts_with(prefix) {
                    continue;
                }
            }
            records.push(self.to_record(&folder_id, file)?);
        }

        sort_most_recent_first(&mut records);
        Ok(records)
    }

    async fn delete(&self, address: &VaultAddress) -> Result<()> {
        self.check_kind(address)?;
        let (folder_id, file_name) = Self::split_address(address)?;

        let file = self
            .client
            .find_file(file_name, folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Document not found in vault: {}", address)))?;

        self.client.delete(&file.id).await?;
        info!(address = %address, "Document deleted from drive vault");
        Ok(())
    }

    async fn exists(&self, address: &VaultAddress) -> Result<bool> {
        self.check_kind(address)?;
        let (folder_id, file_name) = Self::split_address(address)?;
        Ok(self.client.find_file(file_name, folder_id).await?.is_some())
    }
}
