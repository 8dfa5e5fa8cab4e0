//! Backend adapter trait and the backend-independent record types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use docvault_common::{BackendKind, EncryptionScheme, Result, VaultAddress};

/// Prefix under which document objects live in bucket-style backends.
pub const DOCUMENTS_PREFIX: &str = "documents/";

/// Metadata keys persisted through each backend's native facility.
mod keys {
    pub const SOURCE_ID: &str = "original_file_id";
    pub const DISPLAY_NAME: &str = "original_file_name";
    pub const STORED_AT: &str = "storage_timestamp";
    pub const ENCRYPTED: &str = "encrypted";
    pub const SCHEME: &str = "kms_key_name";
    pub const CONTENT_TYPE: &str = "content_type";
}

/// Stored name for a document: `<source_id>_<timestamp>_<name>`.
///
/// Kept as a pure function so address uniqueness across timestamps is
/// directly testable.
pub fn stored_file_name(source_id: &str, name: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}_{}", source_id, at.format("%Y%m%d_%H%M%S"), name)
}

/// Metadata attached to every stored item.
///
/// Round-trips through the backend's native string-map metadata
/// facility via [`DocumentMetadata::to_map`] / [`DocumentMetadata::from_map`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Identifier of the source document this item was created from.
    pub source_id: String,
    /// Human-readable name of the original document.
    pub display_name: String,
    /// When the item was stored.
    pub stored_at: DateTime<Utc>,
    /// Whether the stored bytes are encrypted.
    pub encrypted: bool,
    /// Scheme that produced the stored bytes.
    pub scheme: EncryptionScheme,
    /// Content type of the stored bytes.
    pub content_type: String,
    /// Caller-supplied fields, carried verbatim.
    pub custom: BTreeMap<String, String>,
}

impl DocumentMetadata {
    /// Build metadata for a newly stored document.
    pub fn new(
        source_id: impl Into<String>,
        display_name: impl Into<String>,
        scheme: EncryptionScheme,
        stored_at: DateTime<Utc>,
    ) -> Self {
        let content_type = if scheme.is_encrypted() {
            "application/octet-stream"
        } else {
            "text/plain"
        };
        Self {
            source_id: source_id.into(),
            display_name: display_name.into(),
            stored_at,
            encrypted: scheme.is_encrypted(),
            scheme,
            content_type: content_type.to_string(),
            custom: BTreeMap::new(),
        }
    }

    /// Merge caller-supplied custom fields.
    pub fn with_custom(mut self, custom: BTreeMap<String, String>) -> Self {
        self.custom.extend(custom);
        self
    }

    /// Flatten into the string map stored in the backend.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = self.custom.clone();
        map.insert(keys::SOURCE_ID.to_string(), self.source_id.clone());
        map.insert(keys::DISPLAY_NAME.to_string(), self.display_name.clone());
        map.insert(keys::STORED_AT.to_string(), self.stored_at.to_rfc3339());
        map.insert(keys::ENCRYPTED.to_string(), self.encrypted.to_string());
        map.insert(keys::SCHEME.to_string(), self.scheme.as_tag().to_string());
        map.insert(keys::CONTENT_TYPE.to_string(), self.content_type.clone());
        map
    }

    /// Rebuild from a backend metadata map.
    ///
    /// Unknown keys land in `custom`; missing well-known keys fall back
    /// to neutral values so foreign objects still list cleanly.
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let mut custom = BTreeMap::new();
        let mut source_id = String::new();
        let mut display_name = String::new();
        let mut stored_at = DateTime::UNIX_EPOCH;
        let mut encrypted = false;
        let mut scheme = EncryptionScheme::None;
        let mut content_type = "application/octet-stream".to_string();

        for (key, value) in map {
            match key.as_str() {
                keys::SOURCE_ID => source_id = value.clone(),
                keys::DISPLAY_NAME => display_name = value.clone(),
                keys::STORED_AT => {
                    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
                        stored_at = parsed.with_timezone(&Utc);
                    }
                }
                keys::ENCRYPTED => encrypted = value == "true",
                keys::SCHEME => scheme = EncryptionScheme::from_tag(value),
                keys::CONTENT_TYPE => content_type = value.clone(),
                _ => {
                    custom.insert(key.clone(), value.clone());
                }
            }
        }

        Self {
            source_id,
            display_name,
            stored_at,
            encrypted,
            scheme,
            content_type,
            custom,
        }
    }
}

/// Backend-independent description of a stored item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Locator the item can be retrieved and deleted by.
    pub address: VaultAddress,
    /// Metadata envelope.
    pub metadata: DocumentMetadata,
    /// Stored size in bytes.
    pub size: u64,
    /// Backend creation timestamp, when reported.
    pub created: Option<DateTime<Utc>>,
    /// Backend modification timestamp, when reported.
    pub updated: Option<DateTime<Utc>>,
}

/// A retrieved item: the stored bytes plus its record.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub content: Vec<u8>,
    pub record: VaultRecord,
}

/// Uniform interface over heterogeneous object stores.
///
/// Implementations translate between [`VaultAddress`] paths and their
/// own addressing scheme; an address only ever resolves in the adapter
/// whose kind it carries.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Which backend kind this adapter serves.
    fn kind(&self) -> BackendKind;

    /// Ensure the root container exists with its security policy.
    ///
    /// Idempotent; safe to call on every startup.
    async fn ensure_root(&self) -> Result<()>;

    /// Store bytes under a fresh backend-specific address.
    ///
    /// # Postconditions
    /// - Returns an address that resolves to exactly this item
    /// - The metadata map survives a later [`BackendAdapter::get`]
    async fn put(
        &self,
        source_id: &str,
        name: &str,
        bytes: Vec<u8>,
        metadata: &DocumentMetadata,
    ) -> Result<VaultAddress>;

    /// Fetch an item by address.
    ///
    /// # Errors
    /// - `NotFound` if the address does not resolve
    async fn get(&self, address: &VaultAddress) -> Result<FetchedObject>;

    /// List stored items, most-recent-first where timestamps compare.
    async fn list(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<VaultRecord>>;

    /// Delete an item by address.
    ///
    /// # Errors
    /// - `NotFound` if the address does not resolve (a repeated delete
    ///   after success is `NotFound`, not a no-op)
    async fn delete(&self, address: &VaultAddress) -> Result<()>;

    /// Check whether an address resolves.
    async fn exists(&self, address: &VaultAddress) -> Result<bool>;
}

/// Order records most-recent-first; items without timestamps sort last.
pub fn sort_most_recent_first(records: &mut [VaultRecord]) {
    records.sort_by(|a, b| b.created.cmp(&a.created));
}
