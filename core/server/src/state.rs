//! Shared request state.

use std::sync::Arc;

use docvault_vault::{SourceCleanup, VaultService};

/// State handed to every handler.
pub struct AppState {
    pub vault: Arc<VaultService>,
    /// Optional source-cleanup collaborator used by migrations that
    /// request removal of the original document.
    pub source_cleanup: Option<Arc<dyn SourceCleanup>>,
}

impl AppState {
    /// State without a source-cleanup collaborator.
    pub fn new(vault: Arc<VaultService>) -> Self {
        Self {
            vault,
            source_cleanup: None,
        }
    }

    /// Attach a source-cleanup collaborator.
    pub fn with_source_cleanup(mut self, cleanup: Arc<dyn SourceCleanup>) -> Self {
        self.source_cleanup = Some(cleanup);
        self
    }
}
