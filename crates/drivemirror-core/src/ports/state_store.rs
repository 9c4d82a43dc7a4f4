//! State store port (driven/secondary port)
//!
//! Interface for persisting connections, settings, crawl state, the
//! mirrored catalog and the audit log.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, filesystem) and don't need domain-level classification;
//!   use cases wrap them into `SyncError::Storage`.
//! - All write operations take references to domain entities, allowing
//!   the caller to retain ownership.
//! - `save_sync_state` persists the full crawl checkpoint atomically:
//!   the queue, the cursor and the status move together or not at all.

use chrono::{DateTime, Utc};

use crate::domain::{
    newtypes::{FolderId, ItemKey, UserId},
    AuditEntry, Connection, MirrorItem, SyncSettings, SyncState,
};

/// Port trait for persistent state storage
///
/// ## Implementation Notes
///
/// - Implementations must ensure atomicity for individual operations;
///   the crawl resumes from whatever checkpoint was last saved.
/// - Audit operations are included here rather than in a separate trait
///   to avoid proliferating small repositories.
#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    // --- Connection operations ---

    /// Saves a connection (insert or update)
    async fn save_connection(&self, connection: &Connection) -> anyhow::Result<()>;

    /// Retrieves the connection for a user
    async fn get_connection(&self, user_id: &UserId) -> anyhow::Result<Option<Connection>>;

    /// Deletes the connection for a user (disconnect)
    async fn delete_connection(&self, user_id: &UserId) -> anyhow::Result<()>;

    // --- Settings operations ---

    /// Saves sync settings (insert or update)
    async fn save_settings(&self, settings: &SyncSettings) -> anyhow::Result<()>;

    /// Retrieves the sync settings for a user
    async fn get_settings(&self, user_id: &UserId) -> anyhow::Result<Option<SyncSettings>>;

    // --- Sync state operations ---

    /// Saves the crawl state checkpoint (insert or update)
    async fn save_sync_state(&self, state: &SyncState) -> anyhow::Result<()>;

    /// Retrieves the crawl state for a user
    async fn get_sync_state(&self, user_id: &UserId) -> anyhow::Result<Option<SyncState>>;

    // --- Mirror catalog operations ---

    /// Upserts a catalog row, keyed by `(user_id, item_key)`
    async fn upsert_item(&self, item: &MirrorItem) -> anyhow::Result<()>;

    /// Retrieves one catalog row
    async fn get_item(
        &self,
        user_id: &UserId,
        item_key: &ItemKey,
    ) -> anyhow::Result<Option<MirrorItem>>;

    /// Flags a catalog row as trashed; a no-op if the row is unknown
    async fn mark_item_trashed(
        &self,
        user_id: &UserId,
        item_key: &ItemKey,
    ) -> anyhow::Result<()>;

    /// Counts non-trashed catalog rows for a user
    async fn count_items(&self, user_id: &UserId) -> anyhow::Result<u64>;

    /// Counts trashed catalog rows for a user
    async fn count_trashed_items(&self, user_id: &UserId) -> anyhow::Result<u64>;

    /// Lists non-trashed rows under one parent folder, ordered by name
    async fn list_items_in_folder(
        &self,
        user_id: &UserId,
        parent: &FolderId,
    ) -> anyhow::Result<Vec<MirrorItem>>;

    /// True if any catalog row names this folder as its parent
    ///
    /// Used by the changes puller to decide whether a changed item
    /// belongs to the mirrored subtree.
    async fn is_known_parent(
        &self,
        user_id: &UserId,
        folder_id: &FolderId,
    ) -> anyhow::Result<bool>;

    // --- Audit operations ---

    /// Saves an audit entry
    async fn save_audit(&self, entry: &AuditEntry) -> anyhow::Result<()>;

    /// Retrieves audit entries since a timestamp, newest first
    async fn get_audit_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<AuditEntry>>;
}
