//! In-memory backend adapter for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::adapter::{
    sort_most_recent_first, stored_file_name, BackendAdapter, DocumentMetadata, FetchedObject,
    VaultRecord, DOCUMENTS_PREFIX,
};
use docvault_common::{BackendKind, Error, Result, VaultAddress};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    metadata: DocumentMetadata,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

/// In-memory backend adapter.
///
/// Impersonates either backend kind so service-level behavior (hybrid
/// writes, merge listing, partial failure) can run without network.
/// All data is lost on drop. The availability switch lets tests
/// simulate an unreachable backend.
pub struct MemoryAdapter {
    kind: BackendKind,
    root: String,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    available: Arc<AtomicBool>,
}

impl MemoryAdapter {
    /// Create an empty adapter impersonating the given backend kind.
    ///
    /// `root` stands in for the bucket name or drive folder id.
    pub fn new(kind: BackendKind, root: impl Into<String>) -> Self {
        Self {
            kind,
            root: root.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Toggle simulated availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::backend_unavailable(
                self.kind.as_str(),
                "simulated outage",
            ))
        }
    }

    fn check_kind(&self, address: &VaultAddress) -> Result<()> {
        if address.kind() == self.kind {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Address {} targets a different backend",
                address
            )))
        }
    }

    fn address_path(&self, file_name: &str) -> String {
        match self.kind {
            BackendKind::Bucket => format!("{}{}", DOCUMENTS_PREFIX, file_name),
            BackendKind::Drive => format!("{}/{}", self.root, file_name),
        }
    }

    fn record(&self, path: &str, entry: &Entry) -> VaultRecord {
        VaultRecord {
            address: VaultAddress::new(self.kind, path).expect("path is non-empty"),
            metadata: entry.metadata.clone(),
            size: entry.data.len() as u64,
            created: Some(entry.created),
            updated: Some(entry.updated),
        }
    }

    fn matches_prefix(&self, path: &str, prefix: &str) -> bool {
        match self.kind {
            BackendKind::Bucket => path.starts_with(prefix),
            // Folder stores have no key hierarchy; match on the name.
            BackendKind::Drive => path
                .rsplit_once('/')
                .map(|(_, name)| name.starts_with(prefix))
                .unwrap_or(false),
        }
    }
}

#[async_trait]
impl BackendAdapter for MemoryAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn ensure_root(&self) -> Result<()> {
        self.check_available()
    }

    async fn put(
        &self,
        source_id: &str,
        name: &str,
        bytes: Vec<u8>,
        metadata: &DocumentMetadata,
    ) -> Result<VaultAddress> {
        self.check_available()?;

        let file_name = stored_file_name(source_id, name, metadata.stored_at);
        let path = self.address_path(&file_name);
        let now = Utc::now();

        let entry = Entry {
            data: bytes,
            metadata: metadata.clone(),
            created: now,
            updated: now,
        };

        self.entries.write().unwrap().insert(path.clone(), entry);
        VaultAddress::new(self.kind, path)
    }

    async fn get(&self, address: &VaultAddress) -> Result<FetchedObject> {
        self.check_available()?;
        self.check_kind(address)?;

        let entries = self.entries.read().unwrap();
        let entry = entries
            .get(address.path())
            .ok_or_else(|| Error::NotFound(format!("Document not found in vault: {}", address)))?;

        Ok(FetchedObject {
            content: entry.data.clone(),
            record: self.record(address.path(), entry),
        })
    }

    async fn list(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<VaultRecord>> {
        self.check_available()?;

        let entries = self.entries.read().unwrap();
        let mut records: Vec<VaultRecord> = entries
            .iter()
            .filter(|(path, _)| match prefix {
                Some(prefix) => self.matches_prefix(path, prefix),
                None => true,
            })
            .map(|(path, entry)| self.record(path, entry))
            .collect();

        sort_most_recent_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn delete(&self, address: &VaultAddress) -> Result<()> {
        self.check_available()?;
        self.check_kind(address)?;

        let mut entries = self.entries.write().unwrap();
        entries
            .remove(address.path())
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Document not found in vault: {}", address)))
    }

    async fn exists(&self, address: &VaultAddress) -> Result<bool> {
        self.check_available()?;
        self.check_kind(address)?;
        Ok(self.entries.read().unwrap().contains_key(address.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvault_common::EncryptionScheme;

    fn metadata(source_id: &str) -> DocumentMetadata {
        DocumentMetadata::new(
            source_id,
            "report.txt",
            EncryptionScheme::FipsAes256Gcm,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let adapter = MemoryAdapter::new(BackendKind::Bucket, "vault");
        let meta = metadata("f1");

        let address = adapter
            .put("f1", "report.txt", b"ciphertext".to_vec(), &meta)
            .await
            .unwrap();
        assert!(address.path().starts_with(DOCUMENTS_PREFIX));

        let fetched = adapter.get(&address).await.unwrap();
        assert_eq!(fetched.content, b"ciphertext");
        assert_eq!(fetched.record.metadata, meta);
    }

    #[tokio::test]
    async fn test_drive_addressing() {
        let adapter = MemoryAdapter::new(BackendKind::Drive, "folder123");
        let address = adapter
            .put("f1", "report.txt", vec![1, 2, 3], &metadata("f1"))
            .await
            .unwrap();
        assert_eq!(address.kind(), BackendKind::Drive);
        assert!(address.path().starts_with("folder123/"));
    }

    #[tokio::test]
    async fn test_get_never_stored_is_not_found() {
        let adapter = MemoryAdapter::new(BackendKind::Bucket, "vault");
        let address = VaultAddress::parse("bucket://documents/absent.txt").unwrap();
        assert!(matches!(
            adapter.get(&address).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_twice_second_not_found() {
        let adapter = MemoryAdapter::new(BackendKind::Bucket, "vault");
        let address = adapter
            .put("f1", "r.txt", vec![0], &metadata("f1"))
            .await
            .unwrap();

        adapter.delete(&address).await.unwrap();
        assert!(matches!(
            adapter.delete(&address).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_exists() {
        let adapter = MemoryAdapter::new(BackendKind::Bucket, "vault");
        let address = adapter
            .put("f1", "r.txt", vec![0], &metadata("f1"))
            .await
            .unwrap();
        assert!(adapter.exists(&address).await.unwrap());

        adapter.delete(&address).await.unwrap();
        assert!(!adapter.exists(&address).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_prefix_filter() {
        let adapter = MemoryAdapter::new(BackendKind::Bucket, "vault");
        adapter
            .put("f1", "a.txt", vec![1], &metadata("f1"))
            .await
            .unwrap();
        adapter
            .put("f2", "b.txt", vec![2], &metadata("f2"))
            .await
            .unwrap();

        let records = adapter.list(Some(DOCUMENTS_PREFIX), 100).await.unwrap();
        assert_eq!(records.len(), 2);

        let records = adapter.list(Some("other/"), 100).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let adapter = MemoryAdapter::new(BackendKind::Bucket, "vault");
        for i in 0..5 {
            adapter
                .put(&format!("f{}", i), "r.txt", vec![0], &metadata("x"))
                .await
                .unwrap();
        }
        assert_eq!(adapter.list(None, 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_backend_errors() {
        let adapter = MemoryAdapter::new(BackendKind::Drive, "folder");
        adapter.set_available(false);

        let result = adapter.put("f1", "r.txt", vec![0], &metadata("f1")).await;
        assert!(matches!(result, Err(Error::BackendUnavailable { .. })));

        adapter.set_available(true);
        assert!(adapter.put("f1", "r.txt", vec![0], &metadata("f1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_kind_address_rejected() {
        let adapter = MemoryAdapter::new(BackendKind::Bucket, "vault");
        let drive_address = VaultAddress::parse("drive://folder/file.txt").unwrap();
        assert!(adapter.get(&drive_address).await.is_err());
    }
}
