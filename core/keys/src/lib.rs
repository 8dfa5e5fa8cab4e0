//! Key provider abstraction for the document vault.
//!
//! Two mechanisms can seal document content: an external key-management
//! service ([`ManagedKeyProvider`]) and a local passphrase-derived
//! AES-256-GCM path ([`LocalFipsProvider`]). The [`KeyChain`] applies
//! the selection policy (managed preferred, local fallback) and records
//! the mechanism that ran so retrieval never has to guess.

pub mod chain;
pub mod kms;
pub mod local;
pub mod provider;

pub use chain::KeyChain;
pub use kms::{KmsClient, ManagedKeyProvider};
pub use local::{LocalFipsProvider, Passphrase};
pub use provider::KeyProvider;
