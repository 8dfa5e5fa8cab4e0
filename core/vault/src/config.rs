//! Vault configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use docvault_common::{BackendKind, Error, Result};

/// Which backend(s) a store operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoragePreference {
    /// Bucket store only.
    Bucket,
    /// Drive folder only.
    Drive,
    /// Redundant dual-write to both.
    Hybrid,
}

impl StoragePreference {
    /// Backends this preference writes to.
    pub fn targets(&self) -> &'static [BackendKind] {
        match self {
            Self::Bucket => &[BackendKind::Bucket],
            Self::Drive => &[BackendKind::Drive],
            Self::Hybrid => &[BackendKind::Bucket, BackendKind::Drive],
        }
    }
}

impl fmt::Display for StoragePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucket => f.write_str("bucket"),
            Self::Drive => f.write_str("drive"),
            Self::Hybrid => f.write_str("hybrid"),
        }
    }
}

impl FromStr for StoragePreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bucket" => Ok(Self::Bucket),
            "drive" => Ok(Self::Drive),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Configuration(format!(
                "Invalid storage preference '{}': must be bucket, drive, or hybrid",
                other
            ))),
        }
    }
}

/// Vault service configuration, sourced from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Managed key resource name; local encryption is used when absent.
    pub kms_key_name: Option<String>,
    /// Vault bucket name.
    pub bucket_name: String,
    /// Project used to create the bucket at bootstrap when missing.
    pub project_id: Option<String>,
    /// Drive vault folder id; resolved by name when absent.
    pub drive_folder_id: Option<String>,
    /// Drive vault folder display name.
    pub drive_folder_name: String,
    /// Which backend(s) store operations target.
    pub storage_preference: StoragePreference,
    /// Whether the local FIPS encryption path is enabled.
    pub fips_enabled: bool,
    /// Retention period recorded on migrated documents, in years.
    pub retention_years: u32,
    /// Passphrase backing the local FIPS provider.
    pub passphrase: Option<String>,
    /// Bearer token for the backing Google APIs.
    pub access_token: Option<String>,
    /// Minimum classifier findings for migration eligibility.
    pub min_findings: u32,
    /// Concurrent items during batch migration.
    pub migration_concurrency: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kms_key_name: None,
            bucket_name: "docvault-secure-vault".to_string(),
            project_id: None,
            drive_folder_id: None,
            drive_folder_name: "Secure Vault - FIPS Encrypted".to_string(),
            storage_preference: StoragePreference::Hybrid,
            fips_enabled: true,
            retention_years: 7,
            passphrase: None,
            access_token: None,
            min_findings: 1,
            migration_concurrency: 8,
        }
    }
}

impl VaultConfig {
    /// Load configuration from `VAULT_*` environment variables.
    ///
    /// # Errors
    /// - `Configuration` on an unrecognized storage preference or
    ///   unparseable numeric override
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("VAULT_KMS_KEY") {
            if !key.is_empty() {
                config.kms_key_name = Some(key);
            }
        }
        if let Ok(bucket) = std::env::var("VAULT_BUCKET") {
            config.bucket_name = bucket;
        }
        if let Ok(project) = std::env::var("VAULT_PROJECT") {
            config.project_id = Some(project);
        }
        if let Ok(folder_id) = std::env::var("VAULT_DRIVE_FOLDER_ID") {
            config.drive_folder_id = Some(folder_id);
        }
        if let Ok(folder_name) = std::env::var("VAULT_DRIVE_FOLDER_NAME") {
            config.drive_folder_name = folder_name;
        }
        if let Ok(preference) = std::env::var("VAULT_STORAGE_PREFERENCE") {
            config.storage_preference = preference.parse()?;
        }
        if let Ok(fips) = std::env::var("VAULT_FIPS_ENABLED") {
            config.fips_enabled = fips.eq_ignore_ascii_case("true");
        }
        if let Ok(years) = std::env::var("VAULT_RETENTION_YEARS") {
            config.retention_years = years.parse().map_err(|_| {
                Error::Configuration(format!("Invalid VAULT_RETENTION_YEARS: {}", years))
            })?;
        }
        if let Ok(passphrase) = std::env::var("VAULT_PASSPHRASE") {
            config.passphrase = Some(passphrase);
        }
        if let Ok(token) = std::env::var("VAULT_ACCESS_TOKEN") {
            config.access_token = Some(token);
        }
        if let Ok(min) = std::env::var("VAULT_MIN_FINDINGS") {
            config.min_findings = min.parse().map_err(|_| {
                Error::Configuration(format!("Invalid VAULT_MIN_FINDINGS: {}", min))
            })?;
        }
        if let Ok(concurrency) = std::env::var("VAULT_MIGRATION_CONCURRENCY") {
            config.migration_concurrency = concurrency.parse().map_err(|_| {
                Error::Configuration(format!(
                    "Invalid VAULT_MIGRATION_CONCURRENCY: {}",
                    concurrency
                ))
            })?;
        }

        Ok(config)
    }

    /// Retention tag recorded on migrated documents, e.g. `7_years`.
    pub fn retention_policy_tag(&self) -> String {
        format!("{}_years", self.retention_years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parse() {
        assert_eq!(
            "bucket".parse::<StoragePreference>().unwrap(),
            StoragePreference::Bucket
        );
        assert_eq!(
            "hybrid".parse::<StoragePreference>().unwrap(),
            StoragePreference::Hybrid
        );
        assert!("s3".parse::<StoragePreference>().is_err());
    }

    #[test]
    fn test_preference_targets() {
        assert_eq!(StoragePreference::Bucket.targets(), &[BackendKind::Bucket]);
        assert_eq!(
            StoragePreference::Hybrid.targets(),
            &[BackendKind::Bucket, BackendKind::Drive]
        );
    }

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.storage_preference, StoragePreference::Hybrid);
        assert!(config.fips_enabled);
        assert_eq!(config.retention_policy_tag(), "7_years");
    }

    #[test]
    fn test_retention_override_tag() {
        let config = VaultConfig {
            retention_years: 10,
            ..VaultConfig::default()
        };
        assert_eq!(config.retention_policy_tag(), "10_years");
    }
}
