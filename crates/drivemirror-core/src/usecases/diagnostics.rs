//! Diagnostics use case
//!
//! Read-only snapshot of everything a support conversation needs:
//! connection status, crawl progress, catalog counts and (best effort)
//! the number of pending remote changes. Never mutates any state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    domain::{ConnectionStatus, FolderId, SyncError, SyncStatus, UserId},
    ports::IStateStore,
};

use super::pull_changes::PullChangesUseCase;
use super::token_manager::TokenManagerUseCase;

/// Point-in-time view of the engine's state for one user
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    /// OAuth connection and configured folder
    pub connection: ConnectionStatus,
    /// Crawl lifecycle status, if a sync was ever armed
    pub sync_status: Option<SyncStatus>,
    /// Root the crawl is armed against
    pub root_folder_id: Option<FolderId>,
    /// Folders still awaiting a listing
    pub queued_folders: usize,
    /// True once a full crawl has initialized the change cursor
    pub cursor_initialized: bool,
    /// Non-trashed catalog rows
    pub item_count: u64,
    /// Rows in the virtual trash
    pub trashed_count: u64,
    /// When the last full crawl completed
    pub last_full_scan_at: Option<DateTime<Utc>>,
    /// When changes were last pulled
    pub last_changes_at: Option<DateTime<Utc>>,
    /// Pending remote changes; `None` when the peek was not possible
    pub pending_changes: Option<u64>,
}

/// Use case for the read-only diagnostics snapshot
pub struct DiagnosticsUseCase {
    store: Arc<dyn IStateStore>,
    tokens: Arc<TokenManagerUseCase>,
    changes: Arc<PullChangesUseCase>,
}

impl DiagnosticsUseCase {
    /// Creates a new DiagnosticsUseCase with the required dependencies
    pub fn new(
        store: Arc<dyn IStateStore>,
        tokens: Arc<TokenManagerUseCase>,
        changes: Arc<PullChangesUseCase>,
    ) -> Self {
        Self {
            store,
            tokens,
            changes,
        }
    }

    /// Collects the snapshot for one user
    pub async fn snapshot(&self, user_id: &UserId) -> Result<DiagnosticsSnapshot, SyncError> {
        let connection = self.tokens.status(user_id).await?;
        let state = self
            .store
            .get_sync_state(user_id)
            .await
            .map_err(SyncError::storage)?;
        let item_count = self
            .store
            .count_items(user_id)
            .await
            .map_err(SyncError::storage)?;
        let trashed_count = self
            .store
            .count_trashed_items(user_id)
            .await
            .map_err(SyncError::storage)?;

        // Best effort: the snapshot must work offline and pre-cursor
        let pending_changes = self.changes.peek(user_id).await.ok();

        Ok(DiagnosticsSnapshot {
            connection,
            sync_status: state.as_ref().map(|s| s.status()),
            root_folder_id: state.as_ref().map(|s| s.root_folder_id().clone()),
            queued_folders: state.as_ref().map(|s| s.queued()).unwrap_or(0),
            cursor_initialized: state
                .as_ref()
                .map(|s| s.start_page_token().is_some())
                .unwrap_or(false),
            item_count,
            trashed_count,
            last_full_scan_at: state.as_ref().and_then(|s| s.last_full_scan_at()),
            last_changes_at: state.as_ref().and_then(|s| s.last_changes_at()),
            pending_changes,
        })
    }
}
