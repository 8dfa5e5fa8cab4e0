//! Encryption scheme tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheme identifier recorded with every stored envelope.
///
/// Retrieval dispatches on this tag and never infers the decryption
/// path from the ciphertext itself. The string form is persisted in
/// backend metadata under the `kms_key_name` key: empty for plaintext,
/// `FIPS_AES256_GCM` for locally derived AES-GCM, otherwise the managed
/// key resource name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionScheme {
    /// Stored as plaintext (encryption disabled by configuration).
    None,
    /// Locally derived AES-256-GCM envelope.
    FipsAes256Gcm,
    /// External key-management service; payload is the key resource name.
    Managed(String),
}

/// Wire tag for the local FIPS scheme.
pub const FIPS_SCHEME_ID: &str = "FIPS_AES256_GCM";

impl EncryptionScheme {
    /// Parse the persisted metadata value back into a scheme.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "" => Self::None,
            FIPS_SCHEME_ID => Self::FipsAes256Gcm,
            key_name => Self::Managed(key_name.to_string()),
        }
    }

    /// Persisted metadata value for this scheme.
    pub fn as_tag(&self) -> &str {
        match self {
            Self::None => "",
            Self::FipsAes256Gcm => FIPS_SCHEME_ID,
            Self::Managed(key_name) => key_name,
        }
    }

    /// Whether data stored under this scheme is encrypted at rest.
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for EncryptionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            _ => f.write_str(self.as_tag()),
        }
    }
}
