//! Local key provider backed by the FIPS-approved envelope engine.

use async_trait::async_trait;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::provider::KeyProvider;
use docvault_common::{EncryptionScheme, Error, Result};
use docvault_crypto::{decrypt, encrypt, EnvelopeSecret};

/// Vault passphrase wrapper that zeroizes on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wrap a passphrase string.
    ///
    /// # Errors
    /// - `Configuration` if the passphrase is empty
    pub fn new(passphrase: impl Into<String>) -> Result<Self> {
        let passphrase = passphrase.into();
        if passphrase.is_empty() {
            return Err(Error::Configuration(
                "Vault passphrase cannot be empty".to_string(),
            ));
        }
        Ok(Self(passphrase))
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase([REDACTED])")
    }
}

/// Key provider deriving per-envelope keys from a configured passphrase.
///
/// Produces self-contained AES-256-GCM envelopes; the KDF salt travels
/// in the envelope, so the passphrase alone recovers every document.
pub struct LocalFipsProvider {
    passphrase: Passphrase,
}

impl LocalFipsProvider {
    /// Create a provider from the configured vault passphrase.
    pub fn new(passphrase: Passphrase) -> Self {
        Self { passphrase }
    }
}

#[async_trait]
impl KeyProvider for LocalFipsProvider {
    fn scheme(&self) -> EncryptionScheme {
        EncryptionScheme::FipsAes256Gcm
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let envelope = encrypt(plaintext, &EnvelopeSecret::Password(self.passphrase.as_str()))?;
        Ok(envelope.into_bytes())
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let envelope = std::str::from_utf8(ciphertext)
            .map_err(|_| Error::Format("Envelope is not valid UTF-8".to_string()))?;
        decrypt(envelope, &EnvelopeSecret::Password(self.passphrase.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalFipsProvider {
        LocalFipsProvider::new(Passphrase::new("unit-test-passphrase").unwrap())
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let provider = provider();
        let sealed = provider.encrypt(b"SSN 123-45-6789").await.unwrap();
        assert_ne!(sealed, b"SSN 123-45-6789");
        assert_eq!(provider.decrypt(&sealed).await.unwrap(), b"SSN 123-45-6789");
    }

    #[tokio::test]
    async fn test_scheme_tag() {
        assert_eq!(provider().scheme().as_tag(), "FIPS_AES256_GCM");
    }

    #[tokio::test]
    async fn test_wrong_passphrase_fails() {
        let sealed = provider().encrypt(b"secret").await.unwrap();
        let other = LocalFipsProvider::new(Passphrase::new("different").unwrap());
        assert!(matches!(
            other.decrypt(&sealed).await,
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(matches!(
            Passphrase::new(""),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_passphrase_debug_redacted() {
        let passphrase = Passphrase::new("hunter2").unwrap();
        assert_eq!(format!("{:?}", passphrase), "Passphrase([REDACTED])");
    }
}
