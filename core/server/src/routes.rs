//! REST route handlers for the vault surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{missing_fields, ApiError};
use crate::state::AppState;
use docvault_common::VaultAddress;
use docvault_storage::VaultRecord;
use docvault_vault::ScanReport;

/// Bytes of plaintext included in the JSON retrieval preview.
const PREVIEW_LIMIT: usize = 200;

/// Default listing page size.
const DEFAULT_LIST_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// POST /vault/store
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct StoreRequest {
    pub file_id: Option<String>,
    pub file_name: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct StoreResponse {
    pub status: &'static str,
    pub vault_path: String,
    pub encrypted: bool,
    pub storage_timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replicas: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_backends: Vec<serde_json::Value>,
}

pub async fn store(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StoreRequest>,
) -> Result<Json<StoreResponse>, ApiError> {
    let (file_id, file_name, content) =
        match (request.file_id, request.file_name, request.content) {
            (Some(id), Some(name), Some(content))
                if !id.is_empty() && !name.is_empty() =>
            {
                (id, name, content)
            }
            _ => {
                return Err(missing_fields(
                    "file_id, file_name, and content are required",
                ))
            }
        };

    let outcome = state
        .vault
        .store(&file_id, &file_name, content.as_bytes(), request.metadata)
        .await?;

    let primary = outcome.primary();
    Ok(Json(StoreResponse {
        status: "success",
        vault_path: primary.address.to_string(),
        encrypted: primary.metadata.encrypted,
        storage_timestamp: primary.metadata.stored_at.to_rfc3339(),
        replicas: outcome
            .records
            .iter()
            .skip(1)
            .map(|r| r.address.to_string())
            .collect(),
        failed_backends: outcome
            .failures
            .iter()
            .map(|f| json!({ "backend": f.backend, "error": f.error }))
            .collect(),
    }))
}

// ---------------------------------------------------------------------------
// GET /vault/retrieve/{*vault_path}
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RetrieveParams {
    #[serde(default)]
    pub download: bool,
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Path(vault_path): Path<String>,
    Query(params): Query<RetrieveParams>,
) -> Result<Response, ApiError> {
    let address = VaultAddress::parse(&vault_path)?;
    let document = state.vault.retrieve(&address).await?;

    if params.download {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            document.metadata.display_name.replace('"', "")
        );
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            document.content,
        )
            .into_response());
    }

    let preview_source = String::from_utf8_lossy(&document.content);
    let content_preview = if preview_source.len() > PREVIEW_LIMIT {
        let mut cut = PREVIEW_LIMIT;
        while !preview_source.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &preview_source[..cut])
    } else {
        preview_source.into_owned()
    };

    Ok(Json(json!({
        "status": "success",
        "metadata": document.metadata,
        "size": document.size,
        "created": document.created.map(|t| t.to_rfc3339()),
        "updated": document.updated.map(|t| t.to_rfc3339()),
        "content_preview": content_preview,
    }))
    .into_response())
}

// ---------------------------------------------------------------------------
// GET /vault/list
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListParams {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct DocumentSummary {
    pub vault_path: String,
    pub original_file_id: String,
    pub original_file_name: String,
    pub size: u64,
    pub encrypted: bool,
    pub storage_timestamp: String,
    pub created: Option<DateTime<Utc>>,
}

impl From<&VaultRecord> for DocumentSummary {
    fn from(record: &VaultRecord) -> Self {
        Self {
            vault_path: record.address.to_string(),
            original_file_id: record.metadata.source_id.clone(),
            original_file_name: record.metadata.display_name.clone(),
            size: record.size,
            encrypted: record.metadata.encrypted,
            storage_timestamp: record.metadata.stored_at.to_rfc3339(),
            created: record.created,
        }
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let outcome = state.vault.list(params.prefix.as_deref(), limit).await?;

    let documents: Vec<DocumentSummary> =
        outcome.records.iter().map(DocumentSummary::from).collect();

    let mut body = json!({
        "status": "success",
        "documents": documents,
        "total": documents.len(),
    });
    if !outcome.failures.is_empty() {
        body["failed_backends"] = json!(outcome
            .failures
            .iter()
            .map(|f| json!({ "backend": f.backend, "error": f.error }))
            .collect::<Vec<_>>());
    }

    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// DELETE /vault/delete/{*vault_path}
// ---------------------------------------------------------------------------

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(vault_path): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let address = VaultAddress::parse(&vault_path)?;
    state.vault.delete(&address).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Document deleted from vault",
    })))
}

// ---------------------------------------------------------------------------
// GET /vault/statistics
// ---------------------------------------------------------------------------

pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.vault.statistics().await?;
    Ok(Json(serde_json::to_value(stats).map_err(|e| {
        docvault_common::Error::Serialization(e.to_string())
    })?))
}

// ---------------------------------------------------------------------------
// POST /vault/migrate-sensitive
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct MigrateRequest {
    pub file_id: Option<String>,
    pub file_name: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub scan_results: ScanReport,
    pub source_bucket: Option<String>,
}

#[derive(Serialize)]
pub struct MigrateResponse {
    pub status: &'static str,
    pub vault_path: String,
    pub file_hash: String,
    pub encryption_type: String,
    pub compliance_level: &'static str,
}

pub async fn migrate_sensitive(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MigrateRequest>,
) -> Result<Json<MigrateResponse>, ApiError> {
    let (file_id, file_name, content) =
        match (request.file_id, request.file_name, request.content) {
            (Some(id), Some(name), Some(content))
                if !id.is_empty() && !name.is_empty() =>
            {
                (id, name, content)
            }
            _ => {
                return Err(missing_fields(
                    "file_id, file_name, and content are required",
                ))
            }
        };

    // Source cleanup only runs when the caller names a source and a
    // cleanup collaborator is wired in.
    let cleanup = match (&request.source_bucket, &state.source_cleanup) {
        (Some(_), Some(cleanup)) => Some(cleanup.as_ref()),
        _ => None,
    };

    let outcome = state
        .vault
        .migrate_sensitive(
            &file_id,
            &file_name,
            content.as_bytes(),
            &request.scan_results,
            cleanup,
        )
        .await?;

    let primary = outcome.store.primary();
    Ok(Json(MigrateResponse {
        status: "success",
        vault_path: primary.address.to_string(),
        file_hash: outcome.file_hash,
        encryption_type: primary.metadata.scheme.as_tag().to_string(),
        compliance_level: "FIPS_140_2",
    }))
}

// ---------------------------------------------------------------------------
// GET /vault/health
// ---------------------------------------------------------------------------

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "docvault",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
