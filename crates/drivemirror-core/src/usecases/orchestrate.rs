//! Orchestrate sync use case
//!
//! Drives a complete sync end to end: arm (when the state needs it),
//! index, budgeted runner batches until the queue drains, then one
//! changes pull so the catalog is fresh as of the crawl's own cursor.
//! The retry policy lives here and nowhere else:
//! - auth failures stop immediately; only the user can fix them;
//! - a root mismatch is a benign race with a concurrent folder change:
//!   re-arm against the new folder and keep going;
//! - anything else is fatal and reported with a correlation id.
//!
//! An iteration ceiling bounds the loop so a pathological tree (or a
//! folder change storm) cannot spin forever.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    domain::{AuditAction, AuditEntry, AuditResult, SyncError, SyncStatus, TraceId, UserId},
    ports::IStateStore,
};

use super::index_folder::IndexFolderUseCase;
use super::pull_changes::PullChangesUseCase;
use super::run_sync::{RunOutcome, RunSyncUseCase};
use super::start_sync::StartSyncUseCase;

/// Tunables for the orchestration loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorPolicy {
    /// Folders listed per runner batch
    pub budget_folders: u32,
    /// Ceiling on loop iterations for one sync command
    pub max_iterations: u32,
    /// Pause between consecutive batches
    pub run_delay: Duration,
}

impl Default for OrchestratorPolicy {
    fn default() -> Self {
        Self {
            budget_folders: 5,
            max_iterations: 50,
            run_delay: Duration::from_millis(500),
        }
    }
}

/// Summary of one orchestrated sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Correlation id for this sync
    pub trace_id: TraceId,
    /// Runner iterations executed
    pub iterations: u32,
    /// Times the loop re-armed after a folder change race
    pub rearms: u32,
    /// Folders fully listed across all batches
    pub folders_processed: u32,
    /// File rows upserted across all batches
    pub files_discovered: u32,
    /// Catalog rows touched by the trailing changes pull
    pub changes_pulled: u32,
    /// True when the queue drained and the trailing pull ran
    pub completed: bool,
}

/// Use case composing arm, index, run and pull into one sync command
pub struct OrchestrateSyncUseCase {
    start: Arc<StartSyncUseCase>,
    index: Arc<IndexFolderUseCase>,
    run: Arc<RunSyncUseCase>,
    pull: Arc<PullChangesUseCase>,
    store: Arc<dyn IStateStore>,
    policy: OrchestratorPolicy,
}

impl OrchestrateSyncUseCase {
    /// Creates a new OrchestrateSyncUseCase with the required dependencies
    pub fn new(
        start: Arc<StartSyncUseCase>,
        index: Arc<IndexFolderUseCase>,
        run: Arc<RunSyncUseCase>,
        pull: Arc<PullChangesUseCase>,
        store: Arc<dyn IStateStore>,
        policy: OrchestratorPolicy,
    ) -> Self {
        Self {
            start,
            index,
            run,
            pull,
            store,
            policy,
        }
    }

    /// Runs a full sync to completion under the configured policy
    pub async fn execute(&self, user_id: &UserId) -> Result<SyncReport, SyncError> {
        let trace_id = TraceId::new();
        let mut report = SyncReport {
            trace_id,
            iterations: 0,
            rearms: 0,
            folders_processed: 0,
            files_discovered: 0,
            changes_pulled: 0,
            completed: false,
        };
        let mut need_arm = true;
        let mut drained = false;

        info!(user_id = %user_id, trace_id = %trace_id, "sync started");

        while report.iterations < self.policy.max_iterations {
            report.iterations += 1;

            match self.step(user_id, need_arm).await {
                Ok(outcome) => {
                    need_arm = false;
                    report.folders_processed += outcome.processed_folders;
                    report.files_discovered += outcome.discovered_files;
                    if outcome.drained {
                        drained = true;
                        break;
                    }
                }
                Err(err) if err.is_benign_race() => {
                    // The user picked a different folder mid-crawl;
                    // restart against the new root
                    warn!(user_id = %user_id, trace_id = %trace_id, error = %err, "root changed, re-arming");
                    report.rearms += 1;
                    need_arm = true;
                    continue;
                }
                Err(err) if err.needs_user_action() => {
                    self.audit_failure(user_id, trace_id, &err).await;
                    return Err(err);
                }
                Err(err) => {
                    error!(user_id = %user_id, trace_id = %trace_id, error = %err, "sync failed");
                    self.audit_failure(user_id, trace_id, &err).await;
                    return Err(SyncError::Fatal {
                        trace_id,
                        message: err.to_string(),
                    });
                }
            }

            tokio::time::sleep(self.policy.run_delay).await;
        }

        if !drained {
            let err = SyncError::Fatal {
                trace_id,
                message: format!(
                    "iteration budget of {} exhausted before the queue drained",
                    self.policy.max_iterations
                ),
            };
            self.audit_failure(user_id, trace_id, &err).await;
            return Err(err);
        }

        // The crawl captured (or kept) a cursor, so the feed is drained
        // from exactly the point the catalog reflects
        match self.pull.pull(user_id).await {
            Ok(pulled) => {
                report.changes_pulled = pulled.applied + pulled.trashed;
            }
            Err(err) if err.needs_user_action() => {
                self.audit_failure(user_id, trace_id, &err).await;
                return Err(err);
            }
            Err(err) => {
                error!(user_id = %user_id, trace_id = %trace_id, error = %err, "trailing pull failed");
                self.audit_failure(user_id, trace_id, &err).await;
                return Err(SyncError::Fatal {
                    trace_id,
                    message: err.to_string(),
                });
            }
        }
        report.completed = true;

        info!(
            user_id = %user_id,
            trace_id = %trace_id,
            iterations = report.iterations,
            folders = report.folders_processed,
            files = report.files_discovered,
            changes = report.changes_pulled,
            rearms = report.rearms,
            "sync completed"
        );

        Ok(report)
    }

    /// One loop body: reconcile state when asked, then run one batch
    ///
    /// `start` only resets when the state is absent or fenced off, so a
    /// second sync with unchanged settings skips straight to the runner.
    /// Files and folders seeded by the indexer count towards the batch
    /// outcome so the final report covers the whole tree.
    async fn step(&self, user_id: &UserId, need_arm: bool) -> Result<RunOutcome, SyncError> {
        let mut indexed_files = 0;
        let mut indexed_root = 0;
        if need_arm {
            let state = self.start.execute(user_id, false).await?;
            if state.status() == SyncStatus::Indexing {
                indexed_files = self.index.execute(user_id).await?.files;
                // The root listed by the indexer counts as a processed folder
                indexed_root = 1;
            }
        }
        let mut outcome = self.run.execute(user_id, self.policy.budget_folders).await?;
        outcome.discovered_files += indexed_files;
        outcome.processed_folders += indexed_root;
        Ok(outcome)
    }

    async fn audit_failure(&self, user_id: &UserId, trace_id: TraceId, err: &SyncError) {
        let entry = AuditEntry::new(
            AuditAction::Error,
            AuditResult::failed(err.reason(), err.to_string()),
        )
        .with_user_id(*user_id)
        .with_trace_id(trace_id)
        .with_details(json!({ "http_code": err.http_code() }));
        if let Err(audit_err) = self.store.save_audit(&entry).await {
            warn!(error = %audit_err, "failed to record audit entry");
        }
    }
}
