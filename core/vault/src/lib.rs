//! Vault service for sensitive-document storage.
//!
//! This module provides:
//! - The [`VaultService`] orchestrating encryption, addressing,
//!   persistence and auditing behind a single logical vault API
//! - Storage-preference policy (single backend or redundant dual-write)
//! - The append-only [`audit`] log
//! - The [`migration`] coordinator that batch-moves classifier-flagged
//!   documents into the vault
//!
//! # Architecture
//! The service sits between the HTTP surface and the backend adapters,
//! with the key chain handling all encryption decisions. Every
//! collaborator is constructor-injected; nothing is process-global.

pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod findings;
pub mod migration;
pub mod service;

pub use audit::{AuditAction, AuditEntry, AuditSink, GcsAuditLog, MemoryAuditLog};
pub use bootstrap::build_service;
pub use config::{StoragePreference, VaultConfig};
pub use findings::{ByteRange, Finding, ScanReport};
pub use migration::{
    ClassifiedDocument, ContentFetcher, FailedItem, MigratedItem, MigrationCoordinator,
    MigrationReport,
};
pub use service::{
    hex_digest, BackendFailure, ListOutcome, MigrationOutcome, RetrievedDocument, SourceCleanup,
    StoreOutcome, VaultService, VaultStatistics,
};
