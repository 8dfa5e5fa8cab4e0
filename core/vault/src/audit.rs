//! Append-only audit log of vault operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use docvault_common::Result;
use docvault_storage::GcsClient;

/// Action recorded in an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Store,
    Retrieve,
    Delete,
    Migrate,
}

impl AuditAction {
    /// Wire form, e.g. `STORE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "STORE",
            Self::Retrieve => "RETRIEVE",
            Self::Delete => "DELETE",
            Self::Migrate => "MIGRATE",
        }
    }
}

/// One vault operation, as recorded.
///
/// Entries are written once and never mutated or deleted by the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
    pub action: AuditAction,
    pub actor: String,
    pub origin_address: Option<String>,
}

impl AuditEntry {
    /// Build an entry stamped with the current time.
    pub fn new(
        source_id: impl Into<String>,
        action: AuditAction,
        actor: impl Into<String>,
        origin_address: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source_id: source_id.into(),
            action,
            actor: actor.into(),
            origin_address,
        }
    }
}

/// Destination for audit entries.
///
/// Implementations must be append-only; a failing sink is surfaced to
/// the caller as an error, which the service logs and does not let fail
/// the operation being audited.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// In-memory audit log for tests and the no-bucket configuration.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        self.entries.write().unwrap().push(entry);
        Ok(())
    }
}

/// Audit log writing dated JSON blobs into the vault bucket under
/// `audit_logs/YYYY/MM/DD/`.
pub struct GcsAuditLog {
    client: Arc<GcsClient>,
    bucket: String,
}

impl GcsAuditLog {
    /// Create a log writing into the given bucket.
    pub fn new(client: Arc<GcsClient>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn object_name(entry: &AuditEntry) -> String {
        format!(
            "audit_logs/{}/{}_{}_{}.json",
            entry.timestamp.format("%Y/%m/%d"),
            entry.action.as_str().to_lowercase(),
            entry.source_id,
            entry.timestamp.format("%H%M%S")
        )
    }
}

#[async_trait]
impl AuditSink for GcsAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        let object = Self::object_name(&entry);
        let body = serde_json::to_vec_pretty(&entry)
            .map_err(|e| docvault_common::Error::Serialization(e.to_string()))?;

        self.client
            .upload(
                &self.bucket,
                &object,
                "application/json",
                &body,
                &Default::default(),
            )
            .await?;
        Ok(())
    }
}
