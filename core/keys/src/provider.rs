//! Key provider trait definition.

use async_trait::async_trait;

use docvault_common::{EncryptionScheme, Result};

/// Uniform interface over key mechanisms that can seal and unseal
/// document content.
///
/// Each provider produces exactly one [`EncryptionScheme`]; the scheme
/// recorded at encryption time is the only valid route back to the
/// plaintext.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// The scheme this provider produces and can reverse.
    fn scheme(&self) -> EncryptionScheme;

    /// Seal plaintext into provider-specific ciphertext.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Unseal ciphertext previously produced by this provider.
    ///
    /// # Errors
    /// - `Integrity` if the ciphertext fails authentication
    /// - `Format` if the ciphertext is structurally invalid
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}
