//! Key selection policy: managed first, local fallback, strict dispatch
//! on retrieval.

use std::sync::Arc;
use tracing::warn;

use crate::provider::KeyProvider;
use docvault_common::{EncryptionScheme, Error, Result};

/// Ordered key mechanisms behind a single seal/unseal API.
///
/// Sealing prefers the managed provider when configured and falls back
/// to the local provider on any managed failure, recording which
/// mechanism actually ran in the returned scheme. Unsealing dispatches
/// strictly on the recorded scheme and never guesses.
pub struct KeyChain {
    managed: Option<Arc<dyn KeyProvider>>,
    local: Option<Arc<dyn KeyProvider>>,
}

impl KeyChain {
    /// Build a chain from the configured providers.
    pub fn new(
        managed: Option<Arc<dyn KeyProvider>>,
        local: Option<Arc<dyn KeyProvider>>,
    ) -> Self {
        Self { managed, local }
    }

    /// Whether any encrypting mechanism is configured.
    pub fn encrypts(&self) -> bool {
        self.managed.is_some() || self.local.is_some()
    }

    /// Seal plaintext, returning the ciphertext and the scheme that
    /// produced it.
    ///
    /// With no mechanism configured the data passes through unchanged
    /// under [`EncryptionScheme::None`], with a warning.
    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, EncryptionScheme)> {
        if let Some(managed) = &self.managed {
            match managed.encrypt(plaintext).await {
                Ok(ciphertext) => return Ok((ciphertext, managed.scheme())),
                Err(e) => {
                    warn!(error = %e, "Managed key encryption failed, falling back to local provider");
                }
            }
        }

        if let Some(local) = &self.local {
            let ciphertext = local.encrypt(plaintext).await?;
            return Ok((ciphertext, local.scheme()));
        }

        warn!("No encryption mechanism configured, storing data in plain text");
        Ok((plaintext.to_vec(), EncryptionScheme::None))
    }

    /// Unseal ciphertext via the mechanism recorded in `scheme`.
    ///
    /// # Errors
    /// - `Configuration` if the recorded scheme's provider is not
    ///   configured (the key cannot be recovered; there is no implicit
    ///   fallback)
    pub async fn decrypt(&self, ciphertext: &[u8], scheme: &EncryptionScheme) -> Result<Vec<u8>> {
        match scheme {
            EncryptionScheme::None => Ok(ciphertext.to_vec()),
            EncryptionScheme::FipsAes256Gcm => {
                let local = self.local.as_ref().ok_or_else(|| {
                    Error::Configuration(
                        "Envelope requires the local FIPS provider, which is not configured"
                            .to_string(),
                    )
                })?;
                local.decrypt(ciphertext).await
            }
            EncryptionScheme::Managed(key_name) => {
                let managed = self.managed.as_ref().ok_or_else(|| {
                    Error::Configuration(format!(
                        "Envelope requires managed key '{}', which is not configured",
                        key_name
                    ))
                })?;
                if managed.scheme() != *scheme {
                    return Err(Error::Configuration(format!(
                        "Envelope requires managed key '{}' but '{}' is configured",
                        key_name,
                        managed.scheme()
                    )));
                }
                managed.decrypt(ciphertext).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalFipsProvider, Passphrase};
    use async_trait::async_trait;

    struct UnreachableKms;

    #[async_trait]
    impl KeyProvider for UnreachableKms {
        fn scheme(&self) -> EncryptionScheme {
            EncryptionScheme::Managed("projects/p/keys/k".to_string())
        }

        async fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>> {
            Err(Error::backend_unavailable("kms", "connection refused"))
        }

        async fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>> {
            Err(Error::backend_unavailable("kms", "connection refused"))
        }
    }

    fn local_provider() -> Arc<dyn KeyProvider> {
        Arc::new(LocalFipsProvider::new(
            Passphrase::new("chain-test").unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_fallback_records_local_scheme() {
        let chain = KeyChain::new(Some(Arc::new(UnreachableKms)), Some(local_provider()));

        let (ciphertext, scheme) = chain.encrypt(b"payload").await.unwrap();
        assert_eq!(scheme, EncryptionScheme::FipsAes256Gcm);
        assert_eq!(chain.decrypt(&ciphertext, &scheme).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_no_mechanism_passes_through() {
        let chain = KeyChain::new(None, None);
        let (data, scheme) = chain.encrypt(b"plain").await.unwrap();
        assert_eq!(scheme, EncryptionScheme::None);
        assert_eq!(data, b"plain");
        assert_eq!(chain.decrypt(&data, &scheme).await.unwrap(), b"plain");
    }

    #[tokio::test]
    async fn test_decrypt_never_guesses() {
        // Sealed locally, but presented with a managed scheme tag: the
        // chain must refuse rather than try the local provider.
        let chain = KeyChain::new(None, Some(local_provider()));
        let (ciphertext, _) = chain.encrypt(b"data").await.unwrap();

        let foreign = EncryptionScheme::Managed("projects/other/keys/k".to_string());
        assert!(matches!(
            chain.decrypt(&ciphertext, &foreign).await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_fips_scheme_without_local_provider_fails() {
        let chain = KeyChain::new(None, None);
        assert!(matches!(
            chain
                .decrypt(b"whatever", &EncryptionScheme::FipsAes256Gcm)
                .await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_managed_key_refused() {
        let chain = KeyChain::new(Some(Arc::new(UnreachableKms)), None);
        let other = EncryptionScheme::Managed("projects/elsewhere/keys/x".to_string());
        assert!(matches!(
            chain.decrypt(b"ct", &other).await,
            Err(Error::Configuration(_))
        ));
    }
}
