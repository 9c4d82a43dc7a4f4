//! Run sync use case
//!
//! Drains the breadth-first crawl queue in budgeted batches. Each batch
//! lists up to `budget` folders; after every fully listed folder the
//! state checkpoint is persisted, so an interruption costs at most one
//! folder's worth of repeated work. When the queue drains, the change
//! cursor is captured from the provider so the incremental pipeline can
//! take over without a gap.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    domain::{
        AuditAction, AuditEntry, AuditResult, FolderId, MirrorItem, PendingFolder, SyncError,
        SyncState, SyncStatus, UserId,
    },
    ports::{IDriveProvider, IStateStore, RemoteItem},
};

use super::token_manager::{map_provider, TokenManagerUseCase};

/// Progress report for one budgeted runner batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Folders fully listed in this batch
    pub processed_folders: u32,
    /// File rows upserted in this batch
    pub discovered_files: u32,
    /// Subfolders newly enqueued in this batch
    pub discovered_folders: u32,
    /// Folders still awaiting a listing after this batch
    pub remaining: usize,
    /// True once the queue drained and the change cursor was captured
    pub drained: bool,
}

/// Use case for one budgeted crawl batch
pub struct RunSyncUseCase {
    provider: Arc<dyn IDriveProvider>,
    store: Arc<dyn IStateStore>,
    tokens: Arc<TokenManagerUseCase>,
}

impl RunSyncUseCase {
    /// Creates a new RunSyncUseCase with the required dependencies
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

    /// Lists up to `budget` queued folders and checkpoints after each
    ///
    /// Fails with `RootMismatch` (and leaves the catalog untouched) when
    /// the armed root no longer matches the configured folder. Draining
    /// the queue completes the full scan and initializes the change
    /// cursor.
    pub async fn execute(&self, user_id: &UserId, budget: u32) -> Result<RunOutcome, SyncError> {
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

        // Fencing: the folder may have been re-configured since arming.
        // Nothing is mutated on the mismatch path.
        if !state.matches_root(settings.folder_id()) {
            return Err(SyncError::RootMismatch {
                armed: state.root_folder_id().to_string(),
                configured: settings.folder_id().to_string(),
            });
        }

        let access_token = self.tokens.valid_access_token(user_id).await?;

        let mut outcome = RunOutcome {
            processed_folders: 0,
            discovered_files: 0,
            discovered_folders: 0,
            remaining: state.queued(),
            drained: false,
        };

        for _ in 0..budget {
            // Peek, never pop: an interrupted listing is redone whole
            let Some(head) = state.peek_front().cloned() else {
                break;
            };

            let children = self
                .provider
                .list_children(&access_token, &head.folder_id)
                .await
                .map_err(map_provider)?;

            let counts = ingest_children(&*self.store, &mut state, *user_id, &head, children)
                .await?;
            outcome.discovered_files += counts.files;
            outcome.discovered_folders += counts.folders;

            state.pop_front();
            outcome.processed_folders += 1;
            debug!(
                user_id = %user_id,
                folder = %head.folder_id,
                path = %head.path,
                files = counts.files,
                subfolders = counts.folders,
                "folder listed"
            );

            self.store
                .save_sync_state(&state)
                .await
                .map_err(SyncError::storage)?;
        }

        if state.is_drained() {
            // Cursor capture happens exactly once, on the transition out
            // of the crawl; a run against an already-idle state still
            // reports the queue as drained
            if state.status() != SyncStatus::Idle {
                let cursor = self
                    .provider
                    .latest_change_cursor(&access_token)
                    .await
                    .map_err(map_provider)?;
                state.complete_full_scan(cursor);
                self.store
                    .save_sync_state(&state)
                    .await
                    .map_err(SyncError::storage)?;
                info!(user_id = %user_id, "full crawl complete, change cursor captured");
            }
            outcome.drained = true;
        }

        outcome.remaining = state.queued();

        let entry = AuditEntry::new(AuditAction::RunBatch, AuditResult::success())
            .with_user_id(*user_id)
            .with_details(json!({
                "processed_folders": outcome.processed_folders,
                "discovered_files": outcome.discovered_files,
                "discovered_folders": outcome.discovered_folders,
                "remaining": outcome.remaining,
                "drained": outcome.drained,
            }));
        if let Err(err) = self.store.save_audit(&entry).await {
            warn!(error = %err, "failed to record audit entry");
        }

        Ok(outcome)
    }
}

/// Counts produced by ingesting one folder's listing
pub(crate) struct IngestCounts {
    pub files: u32,
    pub folders: u32,
}

/// Upserts file children into the catalog and enqueues subfolders
///
/// Shared between the indexer (root listing) and the runner (queue
/// drain). Folders never become catalog rows; they travel through the
/// queue and reappear as `parent_folder_id` on their children.
pub(crate) async fn ingest_children(
    store: &dyn IStateStore,
    state: &mut SyncState,
    user_id: UserId,
    parent: &PendingFolder,
    children: Vec<RemoteItem>,
) -> Result<IngestCounts, SyncError> {
    let mut counts = IngestCounts {
        files: 0,
        folders: 0,
    };

    for child in children {
        if child.is_folder {
            let folder_id = FolderId::new(child.id.clone())
                .map_err(|e| SyncError::Provider(format!("invalid remote folder id: {e}")))?;
            let path = format!("{}/{}", parent.path.trim_end_matches('/'), child.name);
            if state.enqueue(PendingFolder::new(folder_id, path)) {
                counts.folders += 1;
            }
            continue;
        }

        let item = upsert_remote_file(store, user_id, &child, parent.folder_id.clone()).await?;
        store
            .upsert_item(&item)
            .await
            .map_err(SyncError::storage)?;
        counts.files += 1;
    }

    Ok(counts)
}

/// Builds the catalog row for a remote file, preserving `discovered_at`
/// on re-listing
pub(crate) async fn upsert_remote_file(
    store: &dyn IStateStore,
    user_id: UserId,
    remote: &RemoteItem,
    parent: FolderId,
) -> Result<MirrorItem, SyncError> {
    let fresh = MirrorItem::from_remote(user_id, remote, parent.clone())
        .map_err(|e| SyncError::Provider(format!("invalid remote item: {e}")))?;

    match store
        .get_item(&user_id, fresh.item_key())
        .await
        .map_err(SyncError::storage)?
    {
        Some(mut existing) => {
            existing.apply_remote(remote);
            if existing.parent_folder_id() != &parent {
                existing.reparent(parent);
            }
            Ok(existing)
        }
        None => Ok(fresh),
    }
}
