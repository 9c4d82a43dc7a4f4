//! Durable crawl state machine
//!
//! `SyncState` is the singleton-per-user record holding all crawl
//! progress: the breadth-first `pending` queue, the armed root, the
//! change cursor, and the lifecycle status. No in-memory crawl state
//! exists anywhere else; any process can pick up where the last call
//! left off by loading this entity.
//!
//! Invariants owned here:
//! - `pending` contains each folder id at most once (enqueue is a
//!   set-like upsert);
//! - the change cursor is cleared whenever the state is re-armed, and
//!   initialized only when the queue first drains;
//! - a folder is only removed from the queue via `pop_front` after its
//!   listing has been fully drained by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{FolderId, PageToken, UserId};

/// Lifecycle status of the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No crawl in progress; the mirror is as fresh as the last pull
    Idle,
    /// Re-armed; the root's immediate contents have not been seeded yet
    Indexing,
    /// The queue is being drained in budgeted batches
    Syncing,
    /// A non-recoverable failure was recorded; manual retry required
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Indexing => "indexing",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// One entry of the durable breadth-first crawl queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFolder {
    /// Remote folder awaiting a children listing
    pub folder_id: FolderId,
    /// Human-readable path of the folder, for diagnostics
    pub path: String,
}

impl PendingFolder {
    pub fn new(folder_id: FolderId, path: impl Into<String>) -> Self {
        Self {
            folder_id,
            path: path.into(),
        }
    }
}

/// Crawl progress for one user's mirror
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    user_id: UserId,
    root_folder_id: FolderId,
    pending: Vec<PendingFolder>,
    start_page_token: Option<PageToken>,
    status: SyncStatus,
    last_full_scan_at: Option<DateTime<Utc>>,
    last_changes_at: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Arms a fresh crawl for the given root
    ///
    /// The queue is seeded with the root itself; the indexer consumes
    /// that entry when it lists the root's immediate children. The change
    /// cursor is cleared: it only becomes meaningful again after the new
    /// crawl completes.
    pub fn armed(user_id: UserId, root_folder_id: FolderId, root_path: impl Into<String>) -> Self {
        let root_entry = PendingFolder::new(root_folder_id.clone(), root_path);
        Self {
            user_id,
            root_folder_id,
            pending: vec![root_entry],
            start_page_token: None,
            status: SyncStatus::Indexing,
            last_full_scan_at: None,
            last_changes_at: None,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn root_folder_id(&self) -> &FolderId {
        &self.root_folder_id
    }

    pub fn pending(&self) -> &[PendingFolder] {
        &self.pending
    }

    pub fn start_page_token(&self) -> Option<&PageToken> {
        self.start_page_token.as_ref()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn last_full_scan_at(&self) -> Option<DateTime<Utc>> {
        self.last_full_scan_at
    }

    pub fn last_changes_at(&self) -> Option<DateTime<Utc>> {
        self.last_changes_at
    }

    /// Number of folders awaiting a listing pass
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    /// True once the queue has drained
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
    }

    /// Fencing check: does the armed root still match the given folder?
    pub fn matches_root(&self, folder_id: &FolderId) -> bool {
        &self.root_folder_id == folder_id
    }

    /// Appends a folder to the tail of the queue unless already present
    ///
    /// Returns true if the folder was actually enqueued.
    pub fn enqueue(&mut self, folder: PendingFolder) -> bool {
        if self
            .pending
            .iter()
            .any(|p| p.folder_id == folder.folder_id)
        {
            return false;
        }
        self.pending.push(folder);
        true
    }

    /// Returns the queue head without removing it
    ///
    /// The runner lists the head folder's children completely before
    /// popping, so an interrupted listing is redone from scratch on retry.
    pub fn peek_front(&self) -> Option<&PendingFolder> {
        self.pending.first()
    }

    /// Removes and returns the queue head
    pub fn pop_front(&mut self) -> Option<PendingFolder> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    /// Transition from indexing into the budgeted-run phase
    pub fn begin_syncing(&mut self) {
        self.status = SyncStatus::Syncing;
    }

    /// Records completion of a full crawl
    ///
    /// Initializes the change cursor (taken from the provider at the
    /// moment the queue drained) unless one is already set.
    pub fn complete_full_scan(&mut self, cursor: PageToken) {
        if self.start_page_token.is_none() {
            self.start_page_token = Some(cursor);
        }
        self.last_full_scan_at = Some(Utc::now());
        self.status = SyncStatus::Idle;
    }

    /// Advances the change cursor after a successful pull
    pub fn record_changes_pull(&mut self, cursor: PageToken) {
        self.start_page_token = Some(cursor);
        self.last_changes_at = Some(Utc::now());
    }

    /// Marks the state as failed; manual retry required
    pub fn mark_error(&mut self) {
        self.status = SyncStatus::Error;
    }

    /// Reconstructs state from persisted fields (repository use)
    pub fn from_parts(
        user_id: UserId,
        root_folder_id: FolderId,
        pending: Vec<PendingFolder>,
        start_page_token: Option<PageToken>,
        status: SyncStatus,
        last_full_scan_at: Option<DateTime<Utc>>,
        last_changes_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user_id,
            root_folder_id,
            pending,
            start_page_token,
            status,
            last_full_scan_at,
            last_changes_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str) -> FolderId {
        FolderId::new(id.to_string()).unwrap()
    }

    fn armed_state() -> SyncState {
        SyncState::armed(UserId::new(), folder("root01"), "/Photos")
    }

    #[test]
    fn test_armed_seeds_queue_with_root() {
        let state = armed_state();
        assert_eq!(state.status(), SyncStatus::Indexing);
        assert_eq!(state.queued(), 1);
        assert_eq!(state.peek_front().unwrap().folder_id, folder("root01"));
        assert!(state.start_page_token().is_none());
    }

    #[test]
    fn test_enqueue_is_set_like() {
        let mut state = armed_state();
        assert!(state.enqueue(PendingFolder::new(folder("sub-a"), "/Photos/A")));
        assert!(!state.enqueue(PendingFolder::new(folder("sub-a"), "/Photos/A")));
        assert!(state.enqueue(PendingFolder::new(folder("sub-b"), "/Photos/B")));
        assert_eq!(state.queued(), 3);
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut state = armed_state();
        state.enqueue(PendingFolder::new(folder("sub-a"), "/Photos/A"));
        state.enqueue(PendingFolder::new(folder("sub-b"), "/Photos/B"));

        assert_eq!(state.pop_front().unwrap().folder_id, folder("root01"));
        assert_eq!(state.pop_front().unwrap().folder_id, folder("sub-a"));
        assert_eq!(state.pop_front().unwrap().folder_id, folder("sub-b"));
        assert!(state.pop_front().is_none());
        assert!(state.is_drained());
    }

    #[test]
    fn test_peek_does_not_remove() {
        let state = armed_state();
        assert_eq!(state.peek_front().unwrap().folder_id, folder("root01"));
        assert_eq!(state.queued(), 1);
    }

    #[test]
    fn test_fencing_check() {
        let state = armed_state();
        assert!(state.matches_root(&folder("root01")));
        assert!(!state.matches_root(&folder("other")));
    }

    #[test]
    fn test_complete_full_scan_initializes_cursor_once() {
        let mut state = armed_state();
        state.pop_front();
        state.complete_full_scan(PageToken::new("100".to_string()).unwrap());

        assert_eq!(state.status(), SyncStatus::Idle);
        assert_eq!(state.start_page_token().unwrap().as_str(), "100");
        assert!(state.last_full_scan_at().is_some());

        // A later scan completion must not clobber an advanced cursor
        state.record_changes_pull(PageToken::new("150".to_string()).unwrap());
        state.complete_full_scan(PageToken::new("200".to_string()).unwrap());
        assert_eq!(state.start_page_token().unwrap().as_str(), "150");
    }

    #[test]
    fn test_record_changes_pull_advances_cursor() {
        let mut state = armed_state();
        state.complete_full_scan(PageToken::new("100".to_string()).unwrap());
        state.record_changes_pull(PageToken::new("101".to_string()).unwrap());
        assert_eq!(state.start_page_token().unwrap().as_str(), "101");
        assert!(state.last_changes_at().is_some());
    }

    #[test]
    fn test_rearm_clears_cursor() {
        let mut state = armed_state();
        state.complete_full_scan(PageToken::new("100".to_string()).unwrap());

        let rearmed = SyncState::armed(*state.user_id(), folder("newroot"), "/Other");
        assert!(rearmed.start_page_token().is_none());
        assert_eq!(rearmed.status(), SyncStatus::Indexing);
        assert_eq!(rearmed.queued(), 1);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut state = armed_state();
        state.enqueue(PendingFolder::new(folder("sub-a"), "/Photos/A"));
        let json = serde_json::to_string(&state).unwrap();
        let parsed: SyncState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, parsed);
    }
}
