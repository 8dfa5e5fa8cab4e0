//! Managed key provider backed by a Cloud KMS endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::provider::KeyProvider;
use docvault_common::{EncryptionScheme, Error, Result};

/// Cloud KMS API base URL.
const KMS_API_BASE: &str = "https://cloudkms.googleapis.com/v1";

/// Request timeout for key-management calls.
const KMS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Debug, Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

/// Thin client for the KMS encrypt/decrypt endpoints.
pub struct KmsClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl KmsClient {
    /// Create a client against the production KMS endpoint.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(KMS_API_BASE, access_token)
    }

    /// Create a client against a custom endpoint (tests, emulators).
    pub fn with_base_url(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent("docvault/0.1")
            .timeout(KMS_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Encrypt raw bytes under the named key.
    pub async fn encrypt(&self, key_name: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let url = format!("{}/{}:encrypt", self.base_url, key_name);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&serde_json::json!({ "plaintext": STANDARD.encode(plaintext) }))
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("kms", format!("encrypt failed: {}", e)))?;

        let body: EncryptResponse = handle_response(response).await?;
        STANDARD
            .decode(&body.ciphertext)
            .map_err(|e| Error::Format(format!("KMS returned invalid base64: {}", e)))
    }

    /// Decrypt ciphertext previously produced by the named key.
    pub async fn decrypt(&self, key_name: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let url = format!("{}/{}:decrypt", self.base_url, key_name);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&serde_json::json!({ "ciphertext": STANDARD.encode(ciphertext) }))
            .send()
            .await
            .map_err(|e| Error::backend_unavailable("kms", format!("decrypt failed: {}", e)))?;

        let body: DecryptResponse = handle_response(response).await?;
        STANDARD
            .decode(&body.plaintext)
            .map_err(|e| Error::Format(format!("KMS returned invalid base64: {}", e)))
    }
}

/// Map a KMS API response onto the common error taxonomy.
async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::backend_unavailable("kms", format!("invalid response: {}", e)))
    } else if status == StatusCode::NOT_FOUND {
        Err(Error::NotFound("KMS key not found".to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::backend_unavailable(
            "kms",
            format!("API error: {} - {}", status, body),
        ))
    }
}

/// Key provider that delegates sealing to a managed KMS key.
pub struct ManagedKeyProvider {
    client: KmsClient,
    key_name: String,
}

impl ManagedKeyProvider {
    /// Create a provider for the given key resource name.
    ///
    /// # Errors
    /// - `Configuration` if the key name is empty
    pub fn new(client: KmsClient, key_name: impl Into<String>) -> Result<Self> {
        let key_name = key_name.into();
        if key_name.is_empty() {
            return Err(Error::Configuration(
                "Managed key name cannot be empty".to_string(),
            ));
        }
        Ok(Self { client, key_name })
    }

    /// The key resource name this provider seals under.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }
}

#[async_trait]
impl KeyProvider for ManagedKeyProvider {
    fn scheme(&self) -> EncryptionScheme {
        EncryptionScheme::Managed(self.key_name.clone())
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.client.encrypt(&self.key_name, plaintext).await
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.client.decrypt(&self.key_name, ciphertext).await
    }
}
