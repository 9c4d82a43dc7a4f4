//! Set folder use case
//!
//! Persists the user's chosen mirror root. Configuration only: changing
//! the folder does not touch any existing crawl state, which is exactly
//! what makes the runner's fencing check necessary.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::{
    domain::{AuditAction, AuditEntry, AuditResult, FolderId, SyncError, SyncSettings, UserId},
    ports::IStateStore,
};

/// Use case for configuring the mirror root folder
pub struct SetFolderUseCase {
    store: Arc<dyn IStateStore>,
}

impl SetFolderUseCase {
    /// Creates a new SetFolderUseCase with the required dependencies
    pub fn new(store: Arc<dyn IStateStore>) -> Self {
        Self { store }
    }

    /// Stores or replaces the mirror root for the user
    pub async fn execute(
        &self,
        user_id: UserId,
        folder_id: FolderId,
        folder_name: &str,
        folder_path: &str,
    ) -> Result<SyncSettings, SyncError> {
        let settings = SyncSettings::new(user_id, folder_id, folder_name, folder_path);
        self.store
            .save_settings(&settings)
            .await
            .map_err(SyncError::storage)?;

        info!(user_id = %user_id, folder = %settings.folder_id(), "mirror root configured");
        let entry = AuditEntry::new(AuditAction::FolderConfigured, AuditResult::success())
            .with_user_id(user_id)
            .with_details(json!({
                "folder_id": settings.folder_id().as_str(),
                "folder_path": folder_path,
            }));
        self.save_audit(entry).await;

        Ok(settings)
    }

    /// Toggles content downloads for the configured mirror
    pub async fn set_downloads_enabled(
        &self,
        user_id: &UserId,
        enabled: bool,
    ) -> Result<SyncSettings, SyncError> {
        let mut settings = self
            .store
            .get_settings(user_id)
            .await
            .map_err(SyncError::storage)?
            .ok_or(SyncError::NoFolderConfigured)?;

        settings.set_downloads_enabled(enabled);
        self.store
            .save_settings(&settings)
            .await
            .map_err(SyncError::storage)?;

        let entry = AuditEntry::new(AuditAction::FolderConfigured, AuditResult::success())
            .with_user_id(*user_id)
            .with_details(json!({ "downloads_enabled": enabled }));
        self.save_audit(entry).await;

        Ok(settings)
    }

    async fn save_audit(&self, entry: AuditEntry) {
        if let Err(err) = self.store.save_audit(&entry).await {
            warn!(error = %err, "failed to record audit entry");
        }
    }
}
