//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! Iteration count follows the NIST minimum recommendation for
//! PBKDF2; derivation is deterministic given password and salt.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::keys::{ContentKey, Salt, KEY_LENGTH};
use docvault_common::{Error, Result};

/// PBKDF2 iteration count (NIST recommended minimum).
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive a 256-bit content key from a password and salt.
///
/// # Preconditions
/// - `password` must not be empty
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if password is empty
pub fn derive_key(password: &[u8], salt: &Salt) -> Result<ContentKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt.as_bytes(), PBKDF2_ITERATIONS, &mut key_bytes);
    Ok(ContentKey::from_bytes(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let salt = Salt::from_bytes([42u8; 32]);
        let key1 = derive_key(b"test-password-123", &salt).unwrap();
        let key2 = derive_key(b"test-password-123", &salt).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let key1 = derive_key(b"password", &Salt::from_bytes([1u8; 32])).unwrap();
        let key2 = derive_key(b"password", &Salt::from_bytes([2u8; 32])).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let salt = Salt::from_bytes([9u8; 32]);
        let key1 = derive_key(b"password1", &salt).unwrap();
        let key2 = derive_key(b"password2", &salt).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_password_fails() {
        assert!(derive_key(b"", &Salt::generate()).is_err());
    }
}
