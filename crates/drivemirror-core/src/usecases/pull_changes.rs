//! Pull changes use case
//!
//! Drives the incremental pipeline: drains the provider's changes feed
//! from the persisted cursor, applies the records to the catalog and
//! advances the cursor. Also offers a non-consuming peek that counts
//! pending changes without touching any state.
//!
//! Membership filtering: the changes feed is account-wide, but only the
//! mirrored subtree matters. A changed item is in scope when its parent
//! is the armed root, a folder already seen in the catalog, or a folder
//! still waiting in the crawl queue. A known row whose parent moves out
//! of scope goes to the virtual trash rather than being deleted.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    domain::{
        AuditAction, AuditEntry, AuditResult, FolderId, ItemKey, PageToken, PendingFolder,
        SyncError, SyncState, UserId,
    },
    ports::{ChangeRecord, IDriveProvider, IStateStore},
};

use super::run_sync::upsert_remote_file;
use super::token_manager::{map_provider, TokenManagerUseCase};

/// Report for one drain of the changes feed
#[derive(Debug, Clone, PartialEq)]
pub struct PullReport {
    /// Catalog rows created or updated
    pub applied: u32,
    /// Rows moved to the virtual trash
    pub trashed: u32,
    /// Folders newly enqueued for a later crawl batch
    pub enqueued_folders: u32,
    /// Records ignored as outside the mirrored subtree
    pub skipped: u32,
    /// Cursor persisted for the next pull
    pub new_cursor: PageToken,
}

/// Use case for the cursor-based incremental pipeline
pub struct PullChangesUseCase {
    provider: Arc<dyn IDriveProvider>,
    store: Arc<dyn IStateStore>,
    tokens: Arc<TokenManagerUseCase>,
}

impl PullChangesUseCase {
    /// Creates a new PullChangesUseCase with the required dependencies
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

    /// Drains the changes feed and advances the cursor
    pub async fn pull(&self, user_id: &UserId) -> Result<PullReport, SyncError> {
        let mut state = self
            .store
            .get_sync_state(user_id)
            .await
            .map_err(SyncError::storage)?
            .ok_or(SyncError::NotArmed)?;
        let cursor = state
            .start_page_token()
            .cloned()
            .ok_or(SyncError::CursorMissing)?;

        let access_token = self.tokens.valid_access_token(user_id).await?;
        let batch = self
            .provider
            .list_changes(&access_token, &cursor)
            .await
            .map_err(map_provider)?;

        let mut report = PullReport {
            applied: 0,
            trashed: 0,
            enqueued_folders: 0,
            skipped: 0,
            new_cursor: batch.new_cursor.clone(),
        };

        for record in &batch.changes {
            self.apply_record(user_id, &mut state, record, &mut report)
                .await?;
        }

        state.record_changes_pull(batch.new_cursor);
        self.store
            .save_sync_state(&state)
            .await
            .map_err(SyncError::storage)?;

        info!(
            user_id = %user_id,
            applied = report.applied,
            trashed = report.trashed,
            enqueued = report.enqueued_folders,
            skipped = report.skipped,
            "changes pulled"
        );
        let entry = AuditEntry::new(AuditAction::ChangesPull, AuditResult::success())
            .with_user_id(*user_id)
            .with_details(json!({
                "records": batch.changes.len(),
                "applied": report.applied,
                "trashed": report.trashed,
                "enqueued_folders": report.enqueued_folders,
                "skipped": report.skipped,
            }));
        if let Err(err) = self.store.save_audit(&entry).await {
            warn!(error = %err, "failed to record audit entry");
        }

        Ok(report)
    }

    /// Counts pending changes without consuming the cursor
    ///
    /// Read-only: the persisted state is not touched, so a pull after a
    /// peek sees exactly the same records.
    pub async fn peek(&self, user_id: &UserId) -> Result<u64, SyncError> {
        let state = self
            .store
            .get_sync_state(user_id)
            .await
            .map_err(SyncError::storage)?
            .ok_or(SyncError::NotArmed)?;
        let cursor = state.start_page_token().ok_or(SyncError::CursorMissing)?;

        let access_token = self.tokens.valid_access_token(user_id).await?;
        self.provider
            .count_changes(&access_token, cursor)
            .await
            .map_err(map_provider)
    }

    /// Applies one change record to the catalog
    async fn apply_record(
        &self,
        user_id: &UserId,
        state: &mut SyncState,
        record: &ChangeRecord,
        report: &mut PullReport,
    ) -> Result<(), SyncError> {
        let item_key = match ItemKey::new(record.item_id.clone()) {
            Ok(key) => key,
            Err(err) => {
                debug!(item_id = %record.item_id, error = %err, "skipping malformed change record");
                report.skipped += 1;
                return Ok(());
            }
        };

        let Some(ref item) = record.item else {
            // Removal record: soft-delete, a no-op for unknown rows
            self.store
                .mark_item_trashed(user_id, &item_key)
                .await
                .map_err(SyncError::storage)?;
            report.trashed += 1;
            return Ok(());
        };

        if item.trashed {
            self.store
                .mark_item_trashed(user_id, &item_key)
                .await
                .map_err(SyncError::storage)?;
            report.trashed += 1;
            return Ok(());
        }

        let parent = match item.parent_id.as_deref().map(str::to_owned) {
            Some(id) => match FolderId::new(id) {
                Ok(folder) => Some(folder),
                Err(_) => None,
            },
            None => None,
        };
        let in_scope = match parent {
            Some(ref folder) => self.in_scope(user_id, state, folder).await?,
            None => false,
        };

        if item.is_folder {
            if !in_scope {
                report.skipped += 1;
                return Ok(());
            }
            let folder_id = FolderId::new(item.id.clone())
                .map_err(|e| SyncError::Provider(format!("invalid remote folder id: {e}")))?;
            if state.enqueue(PendingFolder::new(folder_id, item.name.clone())) {
                report.enqueued_folders += 1;
            }
            return Ok(());
        }

        if let Some(folder) = parent.filter(|_| in_scope) {
            let row = upsert_remote_file(&*self.store, *user_id, item, folder).await?;
            self.store
                .upsert_item(&row)
                .await
                .map_err(SyncError::storage)?;
            report.applied += 1;
        } else if self
            .store
            .get_item(user_id, &item_key)
            .await
            .map_err(SyncError::storage)?
            .is_some()
        {
            // Known row moved outside the mirrored subtree
            self.store
                .mark_item_trashed(user_id, &item_key)
                .await
                .map_err(SyncError::storage)?;
            report.trashed += 1;
        } else {
            report.skipped += 1;
        }

        Ok(())
    }

    /// True when the folder belongs to the mirrored subtree
    async fn in_scope(
        &self,
        user_id: &UserId,
        state: &SyncState,
        folder: &FolderId,
    ) -> Result<bool, SyncError> {
        if state.matches_root(folder) {
            return Ok(true);
        }
        if state.pending().iter().any(|p| &p.folder_id == folder) {
            return Ok(true);
        }
        self.store
            .is_known_parent(user_id, folder)
            .await
            .map_err(SyncError::storage)
    }
}
