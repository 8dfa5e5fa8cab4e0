//! Backend-tagged vault addresses.
//!
//! Every stored item is addressed by a `<backend_kind>://<backend_path>`
//! locator. The tag resolves to exactly one backend adapter; the path is
//! opaque to everything except that adapter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Kind of backing store an address points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Bucket/object store (hierarchical key names, native metadata).
    Bucket,
    /// Folder/file store (parent-folder id, name-based lookup).
    Drive,
}

impl BackendKind {
    /// Wire tag used in addresses, e.g. `bucket` in `bucket://...`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Drive => "drive",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bucket" => Ok(Self::Bucket),
            "drive" => Ok(Self::Drive),
            other => Err(Error::Format(format!("Unknown backend kind: {}", other))),
        }
    }
}

/// Locator for a stored item: backend kind plus backend-specific path.
///
/// Round-trips bit-exactly through its string form
/// `<kind>://<path>`, e.g. `bucket://documents/f1_20260805_120000_report.txt`
/// or `drive://folder123/f1_20260805_120000_report.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultAddress {
    kind: BackendKind,
    path: String,
}

impl VaultAddress {
    /// Create an address from a backend kind and path.
    ///
    /// # Errors
    /// - Returns `Format` if the path is empty.
    pub fn new(kind: BackendKind, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.is_empty() {
            return Err(Error::Format("Address path cannot be empty".to_string()));
        }
        Ok(Self { kind, path })
    }

    /// Parse a wire-format address string.
    ///
    /// # Errors
    /// - Returns `Format` on a missing `://` separator, unknown backend
    ///   tag, or empty path.
    pub fn parse(s: &str) -> Result<Self> {
        let (tag, path) = s
            .split_once("://")
            .ok_or_else(|| Error::Format(format!("Unsupported vault path format: {}", s)))?;
        Self::new(tag.parse()?, path)
    }

    /// The backend this address resolves in.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Backend-specific path component.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for VaultAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind, self.path)
    }
}

impl FromStr for VaultAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_address() {
        let addr = VaultAddress::parse("bucket://documents/f1_20260805_120000_r.txt").unwrap();
        assert_eq!(addr.kind(), BackendKind::Bucket);
        assert_eq!(addr.path(), "documents/f1_20260805_120000_r.txt");
    }

    #[test]
    fn test_parse_drive_address() {
        let addr = VaultAddress::parse("drive://folder123/report.txt").unwrap();
        assert_eq!(addr.kind(), BackendKind::Drive);
        assert_eq!(addr.path(), "folder123/report.txt");
    }

    #[test]
    fn test_display_roundtrip() {
        for s in [
            "bucket://documents/a_b_c.txt",
            "drive://folder/with/nested name.pdf",
        ] {
            let addr = VaultAddress::parse(s).unwrap();
            assert_eq!(addr.to_string(), s);
            assert_eq!(VaultAddress::parse(&addr.to_string()).unwrap(), addr);
        }
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        assert!(VaultAddress::parse("s3://bucket/key").is_err());
    }

    #[test]
    fn test_missing_separator_rejected() {
        assert!(VaultAddress::parse("documents/file.txt").is_err());
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(VaultAddress::parse("bucket://").is_err());
    }
}
