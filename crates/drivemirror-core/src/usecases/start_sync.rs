//! Start sync use case
//!
//! Reconciles the persisted crawl state against the current settings.
//! This is the single fencing operation: a reset discards the queue and
//! change cursor and re-seeds the queue with the root folder, but it
//! only happens when no state exists, the armed root no longer matches
//! the settings, or the caller forces it. A `start` with aligned state
//! is a no-op, so repeating it never resets the cursor.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    domain::{AuditAction, AuditEntry, AuditResult, SyncError, SyncState, UserId},
    ports::IStateStore,
};

/// Use case for arming the crawl
pub struct StartSyncUseCase {
    store: Arc<dyn IStateStore>,
}

impl StartSyncUseCase {
    /// Creates a new StartSyncUseCase with the required dependencies
    pub fn new(store: Arc<dyn IStateStore>) -> Self {
        Self { store }
    }

    /// Arms a fresh crawl when the state needs it, otherwise a no-op
    ///
    /// Requires configured settings; fails with `NoFolderConfigured`
    /// otherwise. The destructive reset runs only when no state exists,
    /// the armed root differs from the configured folder, or `force` is
    /// set. Aligned state is returned untouched.
    pub async fn execute(&self, user_id: &UserId, force: bool) -> Result<SyncState, SyncError> {
        let settings = self
            .store
            .get_settings(user_id)
            .await
            .map_err(SyncError::storage)?
            .ok_or(SyncError::NoFolderConfigured)?;

        if !force {
            if let Some(existing) = self
                .store
                .get_sync_state(user_id)
                .await
                .map_err(SyncError::storage)?
            {
                if existing.matches_root(settings.folder_id()) {
                    debug!(
                        user_id = %user_id,
                        root = %existing.root_folder_id(),
                        "state already aligned, start is a no-op"
                    );
                    return Ok(existing);
                }
            }
        }

        let state = SyncState::armed(
            *user_id,
            settings.folder_id().clone(),
            settings.folder_path(),
        );
        self.store
            .save_sync_state(&state)
            .await
            .map_err(SyncError::storage)?;

        info!(user_id = %user_id, root = %state.root_folder_id(), "crawl armed");
        let entry = AuditEntry::new(AuditAction::SyncArmed, AuditResult::success())
            .with_user_id(*user_id)
            .with_details(json!({
                "root_folder_id": state.root_folder_id().as_str(),
                "forced": force,
            }));
        if let Err(err) = self.store.save_audit(&entry).await {
            warn!(error = %err, "failed to record audit entry");
        }

        Ok(state)
    }
}
