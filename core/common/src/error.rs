//! Common error types for the document vault.

use thiserror::Error;

/// Top-level error type for vault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Address or item does not resolve in the targeted backend.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication-tag or hash mismatch on decrypt/verify.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Malformed envelope or address.
    #[error("Malformed input: {0}")]
    Format(String),

    /// Transient connectivity or auth failure to an external store.
    #[error("Backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Missing required backend or key material for the selected mode.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Shorthand for a backend-unavailable error.
    pub fn backend_unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error should surface as a caller mistake (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Format(_) | Self::InvalidInput(_)
        )
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_unavailable_names_backend() {
        let err = Error::backend_unavailable("bucket", "connection refused");
        assert_eq!(
            err.to_string(),
            "Backend 'bucket' unavailable: connection refused"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::NotFound("x".into()).is_client_error());
        assert!(Error::Format("x".into()).is_client_error());
        assert!(!Error::Integrity("x".into()).is_client_error());
        assert!(!Error::backend_unavailable("drive", "timeout").is_client_error());
    }
}
