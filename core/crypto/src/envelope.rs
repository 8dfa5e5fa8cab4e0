//! Self-contained encrypted envelopes using AES-256-GCM.
//!
//! An envelope is `base64(salt ‖ iv ‖ tag ‖ ciphertext)` with a
//! fixed-offset header: 32-byte KDF salt, 12-byte IV, 16-byte
//! authentication tag. The salt is only meaningful for password-derived
//! keys but is always present so offsets never shift.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::kdf::derive_key;
use crate::keys::{ContentKey, Salt, SALT_LENGTH};
use docvault_common::{Error, Result};

/// IV size for AES-GCM (96 bits).
pub const IV_LENGTH: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_LENGTH: usize = 16;

/// Total fixed header length before the ciphertext.
pub const HEADER_LENGTH: usize = SALT_LENGTH + IV_LENGTH + TAG_LENGTH;

/// Key material for an envelope operation.
///
/// There is deliberately no default: a caller that cannot supply the
/// original password or key cannot decrypt, and finds out immediately.
pub enum EnvelopeSecret<'a> {
    /// Derive the key from a password (salt travels in the envelope).
    Password(&'a str),
    /// Use a key directly; the envelope salt is random filler.
    Key(&'a ContentKey),
}

impl EnvelopeSecret<'_> {
    fn resolve(&self, salt: &Salt) -> Result<ContentKey> {
        match self {
            EnvelopeSecret::Password(password) => derive_key(password.as_bytes(), salt),
            EnvelopeSecret::Key(key) => Ok((*key).clone()),
        }
    }
}

/// Encrypt plaintext into an envelope string.
///
/// # Postconditions
/// - A fresh salt and IV are generated per call, so identical inputs
///   produce different envelopes.
/// - Output is `base64(salt ‖ iv ‖ tag ‖ ciphertext)`.
///
/// # Errors
/// - `InvalidInput` for an empty password
/// - `Crypto` if the cipher fails
pub fn encrypt(plaintext: &[u8], secret: &EnvelopeSecret<'_>) -> Result<String> {
    let salt = Salt::generate();
    let key = secret.resolve(&salt)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let iv = Aes256Gcm::generate_nonce(&mut OsRng);

    // aes-gcm appends the tag to the ciphertext; the envelope layout
    // carries it between the IV and the ciphertext instead.
    let sealed = cipher
        .encrypt(&iv, plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;
    let (body, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);

    let mut raw = Vec::with_capacity(HEADER_LENGTH + body.len());
    raw.extend_from_slice(salt.as_bytes());
    raw.extend_from_slice(&iv);
    raw.extend_from_slice(tag);
    raw.extend_from_slice(body);

    Ok(STANDARD.encode(raw))
}

/// Decrypt an envelope string back to plaintext.
///
/// # Errors
/// - `Format` if the envelope is not valid base64 or shorter than the
///   fixed header
/// - `Integrity` if the authentication tag does not verify
pub fn decrypt(envelope: &str, secret: &EnvelopeSecret<'_>) -> Result<Vec<u8>> {
    let raw = STANDARD
        .decode(envelope)
        .map_err(|e| Error::Format(format!("Envelope is not valid base64: {}", e)))?;

    if raw.len() < HEADER_LENGTH {
        return Err(Error::Format(format!(
            "Envelope too short: {} bytes, header is {}",
            raw.len(),
            HEADER_LENGTH
        )));
    }

    let (salt_bytes, rest) = raw.split_at(SALT_LENGTH);
    let (iv_bytes, rest) = rest.split_at(IV_LENGTH);
    let (tag, body) = rest.split_at(TAG_LENGTH);

    let mut salt_array = [0u8; SALT_LENGTH];
    salt_array.copy_from_slice(salt_bytes);
    let key = secret.resolve(&Salt::from_bytes(salt_array))?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let iv = Nonce::from_slice(iv_bytes);

    let mut sealed = Vec::with_capacity(body.len() + TAG_LENGTH);
    sealed.extend_from_slice(body);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(iv, sealed.as_slice())
        .map_err(|_| Error::Integrity("Envelope authentication failed".to_string()))
}
