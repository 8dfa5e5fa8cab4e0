//! Storage backend abstraction for the document vault.
//!
//! This module provides a trait-based interface over heterogeneous
//! object stores: a bucket-style blob store, a folder-style document
//! store, and an in-memory fake for tests.
//!
//! # Design Principles
//! - Backend isolation: no backend-specific logic escapes its adapter
//! - Async operations: all I/O is async with bounded timeouts
//! - Unified error semantics: consistent taxonomy across backends

pub mod adapter;
pub mod bucket;
pub mod drive;
pub mod memory;

pub use adapter::{
    sort_most_recent_first, stored_file_name, BackendAdapter, DocumentMetadata, FetchedObject,
    VaultRecord, DOCUMENTS_PREFIX,
};
pub use bucket::{BucketAdapter, GcsClient, ObjectResource};
pub use drive::{DriveAdapter, DriveAdapterConfig, DriveClient, DriveFile};
pub use memory::MemoryAdapter;
