//! Wires a [`VaultService`] from configuration.

use std::sync::Arc;

use crate::audit::{AuditSink, GcsAuditLog, MemoryAuditLog};
use crate::config::VaultConfig;
use crate::service::VaultService;
use docvault_common::{BackendKind, Error, Result};
use docvault_keys::{KeyChain, KeyProvider, KmsClient, LocalFipsProvider, ManagedKeyProvider, Passphrase};
use docvault_storage::{
    BackendAdapter, BucketAdapter, DriveAdapter, DriveAdapterConfig, DriveClient, GcsClient,
};

/// Build a service against the real backing APIs.
///
/// Adapters are only constructed for the backends the storage
/// preference names; key providers follow the FIPS/KMS configuration.
///
/// # Errors
/// - `Configuration` when the preference needs a backend but no access
///   token is configured, or FIPS mode is enabled without a passphrase
pub fn build_service(config: VaultConfig) -> Result<VaultService> {
    let token = config.access_token.clone().ok_or_else(|| {
        Error::Configuration("VAULT_ACCESS_TOKEN is required to reach the backing stores".to_string())
    })?;

    let targets = config.storage_preference.targets();

    let mut bucket: Option<Arc<dyn BackendAdapter>> = None;
    let mut gcs_client: Option<Arc<GcsClient>> = None;
    if targets.contains(&BackendKind::Bucket) {
        let client = Arc::new(GcsClient::new(token.clone()));
        bucket = Some(Arc::new(BucketAdapter::new(
            GcsClient::new(token.clone()),
            config.bucket_name.clone(),
            config.project_id.clone(),
        )));
        gcs_client = Some(client);
    }

    let drive: Option<Arc<dyn BackendAdapter>> = if targets.contains(&BackendKind::Drive) {
        Some(Arc::new(DriveAdapter::new(
            DriveClient::new(token.clone()),
            DriveAdapterConfig {
                folder_id: config.drive_folder_id.clone(),
                folder_name: config.drive_folder_name.clone(),
            },
        )))
    } else {
        None
    };

    let managed: Option<Arc<dyn KeyProvider>> = match &config.kms_key_name {
        Some(key_name) => Some(Arc::new(ManagedKeyProvider::new(
            KmsClient::new(token.clone()),
            key_name.clone(),
        )?)),
        None => None,
    };

    let local: Option<Arc<dyn KeyProvider>> = if config.fips_enabled {
        let passphrase = config.passphrase.clone().ok_or_else(|| {
            Error::Configuration(
                "FIPS mode is enabled but VAULT_PASSPHRASE is not set".to_string(),
            )
        })?;
        Some(Arc::new(LocalFipsProvider::new(Passphrase::new(passphrase)?)))
    } else {
        None
    };

    let audit: Arc<dyn AuditSink> = match gcs_client {
        Some(client) => Arc::new(GcsAuditLog::new(client, config.bucket_name.clone())),
        None => Arc::new(MemoryAuditLog::new()),
    };

    Ok(VaultService::new(
        config,
        bucket,
        drive,
        KeyChain::new(managed, local),
        audit,
    ))
}
