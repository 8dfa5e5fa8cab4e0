//! End-to-end tests for the HTTP surface over in-memory backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use docvault_common::BackendKind;
use docvault_keys::{KeyChain, LocalFipsProvider, Passphrase};
use docvault_server::{router, AppState};
use docvault_storage::MemoryAdapter;
use docvault_vault::{MemoryAuditLog, StoragePreference, VaultConfig, VaultService};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    drive: Arc<MemoryAdapter>,
}

impl TestServer {
    async fn start(preference: StoragePreference) -> Self {
        let bucket = Arc::new(MemoryAdapter::new(BackendKind::Bucket, "vault"));
        let drive = Arc::new(MemoryAdapter::new(BackendKind::Drive, "folder123"));

        let config = VaultConfig {
            storage_preference: preference,
            ..VaultConfig::default()
        };

        let keys = KeyChain::new(
            None,
            Some(Arc::new(LocalFipsProvider::new(
                Passphrase::new("http-test-passphrase").unwrap(),
            ))),
        );

        let vault = Arc::new(VaultService::new(
            config,
            Some(bucket.clone()),
            Some(drive.clone()),
            keys,
            Arc::new(MemoryAuditLog::new()),
        ));

        let app = router(Arc::new(AppState::new(vault)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            drive,
        }
    }

    async fn store(&self, file_id: &str, file_name: &str, content: &str) -> Value {
        let response = self
            .client
            .post(format!("{}/vault/store", self.base_url))
            .json(&json!({
                "file_id": file_id,
                "file_name": file_name,
                "content": content,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(StoragePreference::Bucket).await;

    let body: Value = server
        .client
        .get(format!("{}/vault/health", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_store_and_retrieve() {
    let server = TestServer::start(StoragePreference::Bucket).await;

    let stored = server.store("f1", "report.txt", "SSN 123-45-6789").await;
    assert_eq!(stored["status"], "success");
    assert_eq!(stored["encrypted"], true);
    let vault_path = stored["vault_path"].as_str().unwrap();
    assert!(vault_path.starts_with("bucket://documents/f1_"));

    // JSON form with preview.
    let body: Value = server
        .client
        .get(format!("{}/vault/retrieve/{}", server.base_url, vault_path))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["metadata"]["source_id"], "f1");
    assert_eq!(body["content_preview"], "SSN 123-45-6789");

    // Raw download.
    let response = server
        .client
        .get(format!(
            "{}/vault/retrieve/{}?download=true",
            server.base_url, vault_path
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"SSN 123-45-6789");
}

#[tokio::test]
async fn test_store_missing_fields_is_400() {
    let server = TestServer::start(StoragePreference::Bucket).await;

    let response = server
        .client
        .post(format!("{}/vault/store", server.base_url))
        .json(&json!({ "file_id": "f1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn test_retrieve_unknown_is_404() {
    let server = TestServer::start(StoragePreference::Bucket).await;

    let response = server
        .client
        .get(format!(
            "{}/vault/retrieve/bucket://documents/absent.txt",
            server.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_malformed_address_is_400() {
    let server = TestServer::start(StoragePreference::Bucket).await;

    let response = server
        .client
        .get(format!(
            "{}/vault/retrieve/tape://documents/x",
            server.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_list_after_two_stores() {
    let server = TestServer::start(StoragePreference::Bucket).await;
    server.store("f1", "a.txt", "one").await;
    server.store("f2", "b.txt", "two").await;

    let body: Value = server
        .client
        .get(format!(
            "{}/vault/list?prefix=documents/",
            server.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["total"], 2);
    let mut ids: Vec<&str> = body["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["original_file_id"].as_str().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["f1", "f2"]);
}

#[tokio::test]
async fn test_delete_then_404() {
    let server = TestServer::start(StoragePreference::Bucket).await;
    let stored = server.store("f1", "a.txt", "x").await;
    let vault_path = stored["vault_path"].as_str().unwrap();

    let response = server
        .client
        .delete(format!("{}/vault/delete/{}", server.base_url, vault_path))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .client
        .delete(format!("{}/vault/delete/{}", server.base_url, vault_path))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_statistics() {
    let server = TestServer::start(StoragePreference::Bucket).await;
    server.store("f1", "a.txt", "aaaa").await;
    server.store("f2", "b.txt", "bbbb").await;

    let body: Value = server
        .client
        .get(format!("{}/vault/statistics", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["total_documents"], 2);
    assert_eq!(body["encrypted_documents"], 2);
    assert_eq!(body["encryption_percentage"], 100.0);
}

#[tokio::test]
async fn test_migrate_sensitive() {
    let server = TestServer::start(StoragePreference::Bucket).await;

    let response = server
        .client
        .post(format!("{}/vault/migrate-sensitive", server.base_url))
        .json(&json!({
            "file_id": "f1",
            "file_name": "leak.txt",
            "content": "SSN 123-45-6789",
            "scan_results": { "total_findings": 3 },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["encryption_type"], "FIPS_AES256_GCM");
    assert_eq!(body["compliance_level"], "FIPS_140_2");
    assert_eq!(body["file_hash"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_hybrid_partial_failure_still_succeeds() {
    let server = TestServer::start(StoragePreference::Hybrid).await;
    server.drive.set_available(false);

    let response = server
        .client
        .post(format!("{}/vault/store", server.base_url))
        .json(&json!({
            "file_id": "f1",
            "file_name": "r.txt",
            "content": "content",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(body["vault_path"].as_str().unwrap().starts_with("bucket://"));
    let failed = body["failed_backends"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["backend"], "drive");
}

#[tokio::test]
async fn test_hybrid_store_writes_replica() {
    let server = TestServer::start(StoragePreference::Hybrid).await;

    let stored = server.store("f1", "r.txt", "content").await;
    let replicas = stored["replicas"].as_array().unwrap();
    assert_eq!(replicas.len(), 1);
    assert!(replicas[0].as_str().unwrap().starts_with("drive://"));

    // The replica address resolves independently.
    let body: Value = server
        .client
        .get(format!(
            "{}/vault/retrieve/{}",
            server.base_url,
            replicas[0].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["content_preview"], "content");
}
