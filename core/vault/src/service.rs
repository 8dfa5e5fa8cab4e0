//! The vault service: encrypt, address, persist, audit.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::config::VaultConfig;
use crate::findings::ScanReport;
use docvault_common::{BackendKind, Error, Result, VaultAddress};
use docvault_keys::KeyChain;
use docvault_storage::{BackendAdapter, DocumentMetadata, VaultRecord};

/// Upper bound on objects walked when computing statistics.
const STATS_SCAN_LIMIT: usize = 10_000;

/// Actor recorded for operations without an explicit caller identity.
const SYSTEM_ACTOR: &str = "system";

/// One backend's failure during a multi-backend operation.
#[derive(Debug, Clone, Serialize)]
pub struct BackendFailure {
    pub backend: BackendKind,
    pub error: String,
}

/// Result of a store: per-backend records and failures.
///
/// In redundant mode a partial failure keeps the surviving records;
/// nothing is rolled back.
#[derive(Debug)]
pub struct StoreOutcome {
    pub records: Vec<VaultRecord>,
    pub failures: Vec<BackendFailure>,
}

impl StoreOutcome {
    /// The first surviving record.
    pub fn primary(&self) -> &VaultRecord {
        &self.records[0]
    }
}

/// A retrieved document with its decrypted content.
#[derive(Debug)]
pub struct RetrievedDocument {
    pub content: Vec<u8>,
    pub metadata: DocumentMetadata,
    /// Stored (sealed) size in bytes.
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// Result of a merged listing across configured backends.
#[derive(Debug)]
pub struct ListOutcome {
    pub records: Vec<VaultRecord>,
    pub failures: Vec<BackendFailure>,
}

/// Aggregate vault statistics.
#[derive(Debug, Clone, Serialize)]
pub struct VaultStatistics {
    pub total_documents: u64,
    pub total_size_bytes: u64,
    pub encrypted_documents: u64,
    pub encryption_percentage: f64,
}

/// Result of migrating one sensitive document into the vault.
#[derive(Debug)]
pub struct MigrationOutcome {
    pub store: StoreOutcome,
    /// SHA-256 of the original content, hex-encoded.
    pub file_hash: String,
}

/// Orchestrates encryption, addressing, persistence and auditing behind
/// one logical vault API.
///
/// All collaborators are constructor-injected; the service holds no
/// mutable state beyond the append-only audit sink.
pub struct VaultService {
    config: VaultConfig,
    bucket: Option<Arc<dyn BackendAdapter>>,
    drive: Option<Arc<dyn BackendAdapter>>,
    keys: KeyChain,
    audit: Arc<dyn AuditSink>,
}

impl VaultService {
    /// Assemble a service from its parts.
    pub fn new(
        config: VaultConfig,
        bucket: Option<Arc<dyn BackendAdapter>>,
        drive: Option<Arc<dyn BackendAdapter>>,
        keys: KeyChain,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            bucket,
            drive,
            keys,
            audit,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    fn adapter_for(&self, kind: BackendKind) -> Result<&Arc<dyn BackendAdapter>> {
        let adapter = match kind {
            BackendKind::Bucket => self.bucket.as_ref(),
            BackendKind::Drive => self.drive.as_ref(),
        };
        adapter.ok_or_else(|| {
            Error::Configuration(format!(
                "Storage preference '{}' requires the {} backend, which is not configured",
                self.config.storage_preference, kind
            ))
        })
    }

    /// Adapters the current storage preference writes to.
    fn target_adapters(&self) -> Result<Vec<&Arc<dyn BackendAdapter>>> {
        self.config
            .storage_preference
            .targets()
            .iter()
            .map(|kind| self.adapter_for(*kind))
            .collect()
    }

    /// Ensure every configured backend's root container exists.
    ///
    /// Idempotent; called at startup.
    pub async fn bootstrap(&self) -> Result<()> {
        for adapter in self.target_adapters()? {
            adapter.ensure_root().await?;
        }
        Ok(())
    }

    async fn append_audit(
        &self,
        source_id: &str,
        action: AuditAction,
        actor: &str,
        origin_address: Option<String>,
    ) {
        let entry = AuditEntry::new(source_id, action, actor, origin_address);
        if let Err(e) = self.audit.record(entry).await {
            warn!(error = %e, "Could not record audit entry");
        }
    }

    /// Store a document in the vault.
    ///
    /// Encrypts via the key chain, writes to every backend the storage
    /// preference names (concurrently in hybrid mode), and appends one
    /// audit entry. A partial hybrid failure returns the surviving
    /// records alongside the failure; only a total failure is an error.
    pub async fn store(
        &self,
        source_id: &str,
        name: &str,
        content: &[u8],
        custom_metadata: BTreeMap<String, String>,
    ) -> Result<StoreOutcome> {
        self.store_at(source_id, name, content, custom_metadata, Utc::now())
            .await
    }

    /// Store with an explicit timestamp; the timestamp feeds the
    /// backend addressing scheme.
    pub async fn store_at(
        &self,
        source_id: &str,
        name: &str,
        content: &[u8],
        custom_metadata: BTreeMap<String, String>,
        stored_at: DateTime<Utc>,
    ) -> Result<StoreOutcome> {
        if source_id.is_empty() || name.is_empty() {
            return Err(Error::InvalidInput(
                "source_id and name are required".to_string(),
            ));
        }

        let targets = self.target_adapters()?;

        let (payload, scheme) = self.keys.encrypt(content).await?;
        let metadata = DocumentMetadata::new(source_id, name, scheme, stored_at)
            .with_custom(custom_metadata);

        debug!(
            source_id,
            name,
            encrypted = metadata.encrypted,
            backends = targets.len(),
            "Storing document"
        );

        let writes = targets.iter().map(|adapter| {
            let payload = payload.clone();
            let metadata = &metadata;
            async move {
                let kind = adapter.kind();
                let result = adapter.put(source_id, name, payload, metadata).await;
                (kind, result)
            }
        });

        let mut records = Vec::new();
        let mut failures = Vec::new();
        let mut errors = Vec::new();

        for (kind, result) in join_all(writes).await {
            match result {
                Ok(address) => {
                    records.push(VaultRecord {
                        address,
                        metadata: metadata.clone(),
                        size: payload.len() as u64,
                        created: Some(stored_at),
                        updated: Some(stored_at),
                    });
                }
                Err(e) => {
                    warn!(backend = %kind, error = %e, "Backend write failed");
                    failures.push(BackendFailure {
                        backend: kind,
                        error: e.to_string(),
                    });
                    errors.push(e);
                }
            }
        }

        if records.is_empty() {
            return Err(errors.remove(0));
        }

        info!(
            source_id,
            address = %records[0].address,
            replicas = records.len(),
            failed_backends = failures.len(),
            "Document stored in vault"
        );

        self.append_audit(
            source_id,
            AuditAction::Store,
            SYSTEM_ACTOR,
            Some(records[0].address.to_string()),
        )
        .await;

        Ok(StoreOutcome { records, failures })
    }

    /// Retrieve and decrypt a document by address.
    ///
    /// # Errors
    /// - `NotFound` if the address does not resolve
    /// - `Integrity` if the envelope fails authentication
    pub async fn retrieve(&self, address: &VaultAddress) -> Result<RetrievedDocument> {
        let adapter = self.adapter_for(address.kind())?;
        let fetched = adapter.get(address).await?;

        let content = self
            .keys
            .decrypt(&fetched.content, &fetched.record.metadata.scheme)
            .await?;

        debug!(address = %address, size = content.len(), "Document retrieved");

        self.append_audit(
            &fetched.record.metadata.source_id,
            AuditAction::Retrieve,
            SYSTEM_ACTOR,
            Some(address.to_string()),
        )
        .await;

        Ok(RetrievedDocument {
            content,
            metadata: fetched.record.metadata,
            size: fetched.record.size,
            created: fetched.record.created,
            updated: fetched.record.updated,
        })
    }

    /// List documents across every backend the storage preference
    /// names, merged most-recent-first.
    ///
    /// A failing backend degrades the result to partial records with
    /// the failure flagged; only a total failure is an error.
    pub async fn list(&self, prefix: Option<&str>, limit: usize) -> Result<ListOutcome> {
        let targets = self.target_adapters()?;

        let listings = targets.iter().map(|adapter| async move {
            let kind = adapter.kind();
            let result = adapter.list(prefix, limit).await;
            (kind, result)
        });

        let mut records = Vec::new();
        let mut failures = Vec::new();
        let mut errors = Vec::new();

        for (kind, result) in join_all(listings).await {
            match result {
                Ok(backend_records) => records.extend(backend_records),
                Err(e) => {
                    warn!(backend = %kind, error = %e, "Backend listing failed");
                    failures.push(BackendFailure {
                        backend: kind,
                        error: e.to_string(),
                    });
                    errors.push(e);
                }
            }
        }

        if records.is_empty() && !errors.is_empty() && failures.len() == targets.len() {
            return Err(errors.remove(0));
        }

        docvault_storage::sort_most_recent_first(&mut records);
        records.truncate(limit);

        Ok(ListOutcome { records, failures })
    }

    /// Delete a document by address.
    ///
    /// # Errors
    /// - `NotFound` if the address does not resolve (including a repeat
    ///   delete after success)
    pub async fn delete(&self, address: &VaultAddress) -> Result<()> {
        let adapter = self.adapter_for(address.kind())?;
        adapter.delete(address).await?;

        info!(address = %address, "Document deleted from vault");

        self.append_audit(
            address.path(),
            AuditAction::Delete,
            SYSTEM_ACTOR,
            Some(address.to_string()),
        )
        .await;

        Ok(())
    }

    /// Aggregate statistics over every configured backend.
    pub async fn statistics(&self) -> Result<VaultStatistics> {
        let listing = self.list(None, STATS_SCAN_LIMIT).await?;

        let total_documents = listing.records.len() as u64;
        let total_size_bytes: u64 = listing.records.iter().map(|r| r.size).sum();
        let encrypted_documents = listing
            .records
            .iter()
            .filter(|r| r.metadata.encrypted)
            .count() as u64;

        let encryption_percentage = if total_documents > 0 {
            (encrypted_documents as f64 / total_documents as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        Ok(VaultStatistics {
            total_documents,
            total_size_bytes,
            encrypted_documents,
            encryption_percentage,
        })
    }

    /// Migrate a classifier-flagged document into the vault.
    ///
    /// Computes a SHA-256 content hash for integrity verification,
    /// attaches the findings summary and retention/compliance tags to
    /// the metadata, then stores. The original document is only removed
    /// when `cleanup` is supplied, and a cleanup failure never fails
    /// the migration.
    pub async fn migrate_sensitive(
        &self,
        source_id: &str,
        name: &str,
        content: &[u8],
        scan: &ScanReport,
        cleanup: Option<&(dyn SourceCleanup)>,
    ) -> Result<MigrationOutcome> {
        let file_hash = hex_digest(content);

        let mut custom = BTreeMap::new();
        custom.insert("file_hash".to_string(), file_hash.clone());
        custom.insert(
            "migration_timestamp".to_string(),
            Utc::now().to_rfc3339(),
        );
        custom.insert(
            "total_findings".to_string(),
            scan.total_findings.to_string(),
        );
        let info_types = scan.info_types();
        if !info_types.is_empty() {
            custom.insert("finding_types".to_string(), info_types.join(","));
        }
        custom.insert(
            "retention_policy".to_string(),
            self.config.retention_policy_tag(),
        );
        custom.insert("compliance_level".to_string(), "FIPS_140_2".to_string());

        let store = self.store(source_id, name, content, custom).await?;

        if let Some(cleanup) = cleanup {
            if let Err(e) = cleanup.remove(source_id).await {
                warn!(source_id, error = %e, "Could not remove source document");
            }
        }

        self.append_audit(
            source_id,
            AuditAction::Migrate,
            "AUTO",
            Some(store.primary().address.to_string()),
        )
        .await;

        Ok(MigrationOutcome { store, file_hash })
    }
}

/// Removes the original copy of a document after migration.
#[async_trait::async_trait]
pub trait SourceCleanup: Send + Sync {
    /// Remove the source copy of the given document.
    async fn remove(&self, source_id: &str) -> Result<()>;
}

/// Hex-encoded SHA-256 of `content`.
pub fn hex_digest(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::config::StoragePreference;
    use chrono::TimeZone;
    use docvault_keys::{KeyChain, LocalFipsProvider, Passphrase};
    use docvault_storage::MemoryAdapter;

    fn fips_chain() -> KeyChain {
        KeyChain::new(
            None,
            Some(Arc::new(LocalFipsProvider::new(
                Passphrase::new("service-test").unwrap(),
            ))),
        )
    }

    struct Harness {
        service: VaultService,
        bucket: Arc<MemoryAdapter>,
        drive: Arc<MemoryAdapter>,
        audit: Arc<MemoryAuditLog>,
    }

    fn harness(preference: StoragePreference) -> Harness {
        let bucket = Arc::new(MemoryAdapter::new(BackendKind::Bucket, "vault"));
        let drive = Arc::new(MemoryAdapter::new(BackendKind::Drive, "folder123"));
        let audit = Arc::new(MemoryAuditLog::new());

        let config = VaultConfig {
            storage_preference: preference,
            ..VaultConfig::default()
        };

        let service = VaultService::new(
            config,
            Some(bucket.clone()),
            Some(drive.clone()),
            fips_chain(),
            audit.clone(),
        );

        Harness {
            service,
            bucket,
            drive,
            audit,
        }
    }

    #[tokio::test]
    async fn test_store_retrieve_roundtrip_fips() {
        let h = harness(StoragePreference::Bucket);

        let outcome = h
            .service
            .store("f1", "report.txt", b"SSN 123-45-6789", BTreeMap::new())
            .await
            .unwrap();

        let record = outcome.primary();
        assert!(record.metadata.encrypted);
        assert_eq!(record.metadata.scheme.as_tag(), "FIPS_AES256_GCM");

        let retrieved = h.service.retrieve(&record.address).await.unwrap();
        assert_eq!(retrieved.content, b"SSN 123-45-6789");
        assert_eq!(retrieved.metadata.source_id, "f1");
    }

    #[tokio::test]
    async fn test_store_requires_fields() {
        let h = harness(StoragePreference::Bucket);
        assert!(h
            .service
            .store("", "name", b"x", BTreeMap::new())
            .await
            .is_err());
        assert!(h
            .service
            .store("id", "", b"x", BTreeMap::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_hybrid_writes_both_backends() {
        let h = harness(StoragePreference::Hybrid);

        let outcome = h
            .service
            .store("f1", "r.txt", b"content", BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.failures.is_empty());

        let kinds: Vec<_> = outcome.records.iter().map(|r| r.address.kind()).collect();
        assert!(kinds.contains(&BackendKind::Bucket));
        assert!(kinds.contains(&BackendKind::Drive));
    }

    #[tokio::test]
    async fn test_hybrid_partial_failure_keeps_survivor() {
        let h = harness(StoragePreference::Hybrid);
        h.drive.set_available(false);

        let outcome = h
            .service
            .store("f1", "r.txt", b"content", BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].address.kind(), BackendKind::Bucket);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].backend, BackendKind::Drive);

        // The surviving write stays retrievable.
        let retrieved = h.service.retrieve(&outcome.records[0].address).await.unwrap();
        assert_eq!(retrieved.content, b"content");
    }

    #[tokio::test]
    async fn test_all_backends_failing_is_error() {
        let h = harness(StoragePreference::Hybrid);
        h.bucket.set_available(false);
        h.drive.set_available(false);

        assert!(h
            .service
            .store("f1", "r.txt", b"content", BTreeMap::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_backend_is_configuration_error() {
        let audit = Arc::new(MemoryAuditLog::new());
        let config = VaultConfig {
            storage_preference: StoragePreference::Hybrid,
            ..VaultConfig::default()
        };
        let bucket = Arc::new(MemoryAdapter::new(BackendKind::Bucket, "vault"));
        let service =
            VaultService::new(config, Some(bucket), None, fips_chain(), audit);

        assert!(matches!(
            service.store("f1", "r.txt", b"x", BTreeMap::new()).await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_address_unique_across_timestamps() {
        let h = harness(StoragePreference::Bucket);
        let t1 = Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 1).unwrap();

        let first = h
            .service
            .store_at("f1", "report.txt", b"v1", BTreeMap::new(), t1)
            .await
            .unwrap();
        let second = h
            .service
            .store_at("f1", "report.txt", b"v2", BTreeMap::new(), t2)
            .await
            .unwrap();

        assert_ne!(first.primary().address, second.primary().address);
    }

    #[tokio::test]
    async fn test_retrieve_never_stored_not_found() {
        let h = harness(StoragePreference::Bucket);
        let address = VaultAddress::parse("bucket://documents/absent.txt").unwrap();
        assert!(matches!(
            h.service.retrieve(&address).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_twice_second_not_found() {
        let h = harness(StoragePreference::Bucket);
        let outcome = h
            .service
            .store("f1", "r.txt", b"x", BTreeMap::new())
            .await
            .unwrap();
        let address = outcome.primary().address.clone();

        h.service.delete(&address).await.unwrap();
        assert!(matches!(
            h.service.delete(&address).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_after_two_stores() {
        let h = harness(StoragePreference::Bucket);
        h.service
            .store("f1", "a.txt", b"one", BTreeMap::new())
            .await
            .unwrap();
        h.service
            .store("f2", "b.txt", b"two", BTreeMap::new())
            .await
            .unwrap();

        let listing = h.service.list(Some("documents/"), 100).await.unwrap();
        assert_eq!(listing.records.len(), 2);
        let mut ids: Vec<_> = listing
            .records
            .iter()
            .map(|r| r.metadata.source_id.clone())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["f1".to_string(), "f2".to_string()]);
    }

    #[tokio::test]
    async fn test_list_degrades_on_backend_failure() {
        let h = harness(StoragePreference::Hybrid);
        h.service
            .store("f1", "a.txt", b"one", BTreeMap::new())
            .await
            .unwrap();

        h.drive.set_available(false);
        let listing = h.service.list(None, 100).await.unwrap();

        assert_eq!(listing.failures.len(), 1);
        assert_eq!(listing.failures[0].backend, BackendKind::Drive);
        // Bucket copies still listed.
        assert!(!listing.records.is_empty());
    }

    #[tokio::test]
    async fn test_statistics() {
        let h = harness(StoragePreference::Bucket);
        h.service
            .store("f1", "a.txt", b"aaaa", BTreeMap::new())
            .await
            .unwrap();
        h.service
            .store("f2", "b.txt", b"bbbb", BTreeMap::new())
            .await
            .unwrap();

        let stats = h.service.statistics().await.unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.encrypted_documents, 2);
        assert_eq!(stats.encryption_percentage, 100.0);
        assert!(stats.total_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_audit_entries_per_operation() {
        let h = harness(StoragePreference::Bucket);
        let outcome = h
            .service
            .store("f1", "a.txt", b"x", BTreeMap::new())
            .await
            .unwrap();
        let address = outcome.primary().address.clone();

        h.service.retrieve(&address).await.unwrap();
        h.service.delete(&address).await.unwrap();

        let actions: Vec<_> = h.audit.entries().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Store, AuditAction::Retrieve, AuditAction::Delete]
        );
    }

    #[tokio::test]
    async fn test_migrate_sensitive_metadata() {
        let h = harness(StoragePreference::Bucket);

        let scan = ScanReport::with_count(3);
        let outcome = h
            .service
            .migrate_sensitive("f1", "leak.txt", b"SSN 123-45-6789", &scan, None)
            .await
            .unwrap();

        assert_eq!(outcome.file_hash.len(), 64);

        let record = outcome.store.primary();
        assert_eq!(
            record.metadata.custom.get("file_hash"),
            Some(&outcome.file_hash)
        );
        assert_eq!(
            record.metadata.custom.get("total_findings"),
            Some(&"3".to_string())
        );
        assert_eq!(
            record.metadata.custom.get("retention_policy"),
            Some(&"7_years".to_string())
        );
        assert_eq!(
            record.metadata.custom.get("compliance_level"),
            Some(&"FIPS_140_2".to_string())
        );

        let actions: Vec<_> = h.audit.entries().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Store, AuditAction::Migrate]);
    }

    #[tokio::test]
    async fn test_migrate_cleanup_failure_does_not_fail_migration() {
        struct FailingCleanup;

        #[async_trait::async_trait]
        impl SourceCleanup for FailingCleanup {
            async fn remove(&self, _source_id: &str) -> Result<()> {
                Err(Error::backend_unavailable("bucket", "cleanup outage"))
            }
        }

        let h = harness(StoragePreference::Bucket);
        let result = h
            .service
            .migrate_sensitive(
                "f1",
                "leak.txt",
                b"data",
                &ScanReport::with_count(1),
                Some(&FailingCleanup),
            )
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_hex_digest_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            hex_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
