//! HTTP surface for the document vault.
//!
//! Composes the Axum router over a [`VaultService`] and starts the
//! listener. Handlers translate between the JSON wire contract and the
//! service types; all vault behavior lives below this layer.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

pub use state::AppState;

use docvault_common::Result;
use docvault_vault::VaultService;

/// Build the router with all vault routes registered.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/vault/store", post(routes::store))
        .route("/vault/retrieve/{*vault_path}", get(routes::retrieve))
        .route("/vault/list", get(routes::list))
        .route("/vault/delete/{*vault_path}", delete(routes::delete))
        .route("/vault/statistics", get(routes::statistics))
        .route("/vault/migrate-sensitive", post(routes::migrate_sensitive))
        .route("/vault/health", get(routes::health))
        .with_state(state)
}

/// Bind and serve until shut down.
///
/// Runs the vault bootstrap (root-container checks) before accepting
/// traffic.
pub async fn serve(addr: &str, vault: Arc<VaultService>) -> Result<()> {
    vault.bootstrap().await?;

    let state = Arc::new(AppState::new(vault));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Starting vault server");
    axum::serve(listener, router(state))
        .await
        .map_err(docvault_common::Error::Io)?;

    Ok(())
}
