//! Cryptographic engine for the document vault.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation
//! - AES-256-GCM authenticated encryption
//! - The self-contained envelope format (salt ‖ iv ‖ tag ‖ ciphertext)
//!
//! # Security
//! Key material is explicit at every call site. There is no fallback or
//! placeholder key: decryption without the original password or key
//! fails before any cipher work happens.

pub mod envelope;
pub mod kdf;
pub mod keys;

pub use envelope::{decrypt, encrypt, EnvelopeSecret, HEADER_LENGTH, IV_LENGTH, TAG_LENGTH};
pub use kdf::{derive_key, PBKDF2_ITERATIONS};
pub use keys::{ContentKey, Salt, KEY_LENGTH, SALT_LENGTH};
