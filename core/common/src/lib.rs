//! Common types shared across the document vault.
//!
//! This crate holds the error taxonomy, the backend-tagged address type,
//! and the encryption scheme tag that the crypto, key, storage and vault
//! crates all agree on.

pub mod address;
pub mod error;
pub mod scheme;

pub use address::{BackendKind, VaultAddress};
pub use error::{Error, Result};
pub use scheme::{EncryptionScheme, FIPS_SCHEME_ID};
