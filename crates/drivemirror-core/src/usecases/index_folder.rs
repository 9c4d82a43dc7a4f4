//! Index folder use case
//!
//! Seeds the crawl from the armed root: lists the root folder's
//! immediate children, upserts its files, enqueues its subfolders and
//! consumes the root's own queue entry. After indexing, the state sits
//! in `Syncing` and the runner takes over.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::{
    domain::{AuditAction, AuditEntry, AuditResult, SyncError, SyncState, SyncStatus, UserId},
    ports::{IDriveProvider, IStateStore},
};

use super::run_sync::ingest_children;
use super::token_manager::{map_provider, TokenManagerUseCase};

/// Result of the root listing
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOutcome {
    /// State after indexing
    pub state: SyncState,
    /// File rows upserted from the root listing
    pub files: u32,
    /// Subfolders enqueued from the root listing
    pub subfolders: u32,
}

/// Use case for the initial root listing of a crawl
pub struct IndexFolderUseCase {
    provider: Arc<dyn IDriveProvider>,
    store: Arc<dyn IStateStore>,
    tokens: Arc<TokenManagerUseCase>,
}

impl IndexFolderUseCase {
    /// Creates a new IndexFolderUseCase with the required dependencies
    pub fn new(
        provider: Arc<dyn IDriveProvider>,
        store: Arc<dyn IStateStore>,
        tokens: Arc<TokenManagerUseCase>,
    ) -> Self {
        Self {
            provider,
            store,
            tokens,
        }
    }

    /// Lists the root's immediate children and moves the state to `Syncing`
    ///
    /// A no-op when the state has already left `Indexing`: repeating the
    /// call after a crash cannot double-seed the queue.
    pub async fn execute(&self, user_id: &UserId) -> Result<IndexOutcome, SyncError> {
        let settings = self
            .store
            .get_settings(user_id)
            .await
            .map_err(SyncError::storage)?
            .ok_or(SyncError::NoFolderConfigured)?;
        let mut state = self
            .store
            .get_sync_state(user_id)
            .await
            .map_err(SyncError::storage)?
            .ok_or(SyncError::NotArmed)?;

        if !state.matches_root(settings.folder_id()) {
            return Err(SyncError::RootMismatch {
                armed: state.root_folder_id().to_string(),
                configured: settings.folder_id().to_string(),
            });
        }

        if state.status() != SyncStatus::Indexing {
            return Ok(IndexOutcome {
                state,
                files: 0,
                subfolders: 0,
            });
        }

        let access_token = self.tokens.valid_access_token(user_id).await?;

        // The armed queue holds exactly the root entry
        let root_entry = state.peek_front().cloned().ok_or(SyncError::NotArmed)?;
        let children = self
            .provider
            .list_children(&access_token, &root_entry.folder_id)
            .await
            .map_err(map_provider)?;

        let counts =
            ingest_children(&*self.store, &mut state, *user_id, &root_entry, children).await?;
        state.pop_front();
        state.begin_syncing();

        self.store
            .save_sync_state(&state)
            .await
            .map_err(SyncError::storage)?;

        info!(
            user_id = %user_id,
            root = %root_entry.folder_id,
            files = counts.files,
            subfolders = counts.folders,
            "root indexed"
        );
        let entry = AuditEntry::new(AuditAction::IndexComplete, AuditResult::success())
            .with_user_id(*user_id)
            .with_details(json!({
                "root_folder_id": root_entry.folder_id.as_str(),
                "files": counts.files,
                "subfolders": counts.folders,
            }));
        if let Err(err) = self.store.save_audit(&entry).await {
            warn!(error = %err, "failed to record audit entry");
        }

        Ok(IndexOutcome {
            state,
            files: counts.files,
            subfolders: counts.folders,
        })
    }
}
