//! Batch migration of classifier-flagged documents into the vault.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::findings::ScanReport;
use crate::service::{SourceCleanup, VaultService};
use docvault_common::Result;

/// Fetches document content from the external source, keyed by id.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Download the document's bytes.
    async fn fetch(&self, source_id: &str) -> Result<Vec<u8>>;
}

/// One classifier result feeding the coordinator.
#[derive(Debug, Clone)]
pub struct ClassifiedDocument {
    pub source_id: String,
    pub name: String,
    pub report: ScanReport,
}

/// A successfully migrated item.
#[derive(Debug, Clone, Serialize)]
pub struct MigratedItem {
    pub source_id: String,
    pub name: String,
    pub findings_count: u32,
    pub vault_path: String,
    pub file_hash: String,
}

/// An item whose migration failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub source_id: String,
    pub name: String,
    pub error: String,
}

/// Per-item outcome of a migration batch.
#[derive(Debug, Default, Serialize)]
pub struct MigrationReport {
    pub migrated: Vec<MigratedItem>,
    pub failed: Vec<FailedItem>,
    /// Items below the findings threshold.
    pub skipped: usize,
}

/// Moves flagged documents into the vault, one isolated unit of work
/// per item.
///
/// Eligible items (finding count at or above the threshold) are fetched
/// and migrated with a bounded concurrent fan-out; a failing item is
/// reported and never stops the rest of the batch.
pub struct MigrationCoordinator {
    vault: Arc<VaultService>,
    fetcher: Arc<dyn ContentFetcher>,
    cleanup: Option<Arc<dyn SourceCleanup>>,
    min_findings: u32,
    concurrency: usize,
}

impl MigrationCoordinator {
    /// Create a coordinator using the vault configuration's threshold
    /// and concurrency bound.
    pub fn new(vault: Arc<VaultService>, fetcher: Arc<dyn ContentFetcher>) -> Self {
        let min_findings = vault.config().min_findings;
        let concurrency = vault.config().migration_concurrency.max(1);
        Self {
            vault,
            fetcher,
            cleanup: None,
            min_findings,
            concurrency,
        }
    }

    /// Also remove source copies after each successful migration.
    pub fn with_cleanup(mut self, cleanup: Arc<dyn SourceCleanup>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Override the eligibility threshold.
    pub fn with_min_findings(mut self, min_findings: u32) -> Self {
        self.min_findings = min_findings;
        self
    }

    async fn migrate_one(
        &self,
        doc: ClassifiedDocument,
    ) -> std::result::Result<MigratedItem, FailedItem> {
        let fail = |error: String| FailedItem {
            source_id: doc.source_id.clone(),
            name: doc.name.clone(),
            error,
        };

        let content = self
            .fetcher
            .fetch(&doc.source_id)
            .await
            .map_err(|e| fail(format!("content fetch failed: {}", e)))?;

        let outcome = self
            .vault
            .migrate_sensitive(
                &doc.source_id,
                &doc.name,
                &content,
                &doc.report,
                self.cleanup.as_deref(),
            )
            .await
            .map_err(|e| fail(e.to_string()))?;

        Ok(MigratedItem {
            findings_count: doc.report.total_findings,
            source_id: doc.source_id,
            name: doc.name,
            vault_path: outcome.store.primary().address.to_string(),
            file_hash: outcome.file_hash,
        })
    }

    /// Run a batch. Never aborts: every item lands in `migrated`,
    /// `failed`, or the `skipped` count.
    pub async fn run(&self, batch: Vec<ClassifiedDocument>) -> MigrationReport {
        let (eligible, skipped): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .partition(|doc| doc.report.total_findings >= self.min_findings);

        let skipped = skipped.len();
        info!(
            eligible = eligible.len(),
            skipped, "Starting sensitive-document migration batch"
        );

        let results: Vec<_> = stream::iter(eligible)
            .map(|doc| self.migrate_one_tracked(doc))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = MigrationReport {
            skipped,
            ..MigrationReport::default()
        };
        for result in results {
            match result {
                Ok(item) => report.migrated.push(item),
                Err(item) => report.failed.push(item),
            }
        }

        info!(
            migrated = report.migrated.len(),
            failed = report.failed.len(),
            skipped = report.skipped,
            "Migration batch complete"
        );
        report
    }

    async fn migrate_one_tracked(
        &self,
        doc: ClassifiedDocument,
    ) -> std::result::Result<MigratedItem, FailedItem> {
        let result = self.migrate_one(doc).await;
        if let Err(failed) = &result {
            warn!(
                source_id = %failed.source_id,
                error = %failed.error,
                "Document migration failed"
            );
        }
        result
    }
}
