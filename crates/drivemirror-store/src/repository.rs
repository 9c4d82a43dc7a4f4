//! SQLite implementation of IStateStore
//!
//! This module provides the concrete SQLite-based implementation of the
//! state store port defined in drivemirror-core. It handles all domain
//! type serialization/deserialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type       | SQL Type | Strategy                    |
//! |-------------------|----------|-----------------------------|
//! | UserId, TraceId   | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | FolderId, ItemKey | TEXT     | String via `.as_str()` / `FromStr` |
//! | PageToken         | TEXT     | String via `.as_str()` / `PageToken::new()` |
//! | DateTime<Utc>     | TEXT     | ISO 8601 via `to_rfc3339()` / `DateTime::parse_from_rfc3339()` |
//! | SyncStatus        | TEXT     | Plain string ("idle", "indexing", ...) |
//! | Vec<String> scopes | TEXT    | serde_json array            |
//! | Vec<PendingFolder> | TEXT    | serde_json array            |
//! | VideoMetadata     | TEXT     | serde_json serialization    |
//! | AuditAction       | TEXT     | serde_json serialization    |
//! | AuditResult       | TEXT     | serde_json serialization    |

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use drivemirror_core::domain::{
    newtypes::{FolderId, ItemKey, PageToken, TraceId, UserId},
    AuditAction, AuditEntry, AuditResult, Connection, MirrorItem, PendingFolder, SyncSettings,
    SyncState, SyncStatus, VideoMetadata,
};
use drivemirror_core::ports::IStateStore;

use crate::StoreError;

/// SQLite-based implementation of the state store port
///
/// Provides persistent storage for all domain entities using SQLite.
/// All operations are performed through a connection pool for concurrency.
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Serialize a SyncStatus to a string for storage
fn sync_status_to_string(status: SyncStatus) -> String {
    status.to_string()
}

/// Deserialize a SyncStatus from its stored string representation
fn sync_status_from_string(s: &str) -> Result<SyncStatus, StoreError> {
    match s {
        "idle" => Ok(SyncStatus::Idle),
        "indexing" => Ok(SyncStatus::Indexing),
        "syncing" => Ok(SyncStatus::Syncing),
        "error" => Ok(SyncStatus::Error),
        other => Err(StoreError::SerializationError(format!(
            "Unknown sync status: {}",
            other
        ))),
    }
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Try parsing without timezone (SQLite default format)
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

fn parse_user_id(s: &str) -> Result<UserId, StoreError> {
    UserId::from_str(s)
        .map_err(|e| StoreError::SerializationError(format!("Invalid UserId '{}': {}", s, e)))
}

fn parse_folder_id(s: &str) -> Result<FolderId, StoreError> {
    FolderId::from_str(s)
        .map_err(|e| StoreError::SerializationError(format!("Invalid FolderId '{}': {}", s, e)))
}

fn parse_item_key(s: &str) -> Result<ItemKey, StoreError> {
    ItemKey::from_str(s)
        .map_err(|e| StoreError::SerializationError(format!("Invalid ItemKey '{}': {}", s, e)))
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct a Connection from a database row
fn connection_from_row(row: &SqliteRow) -> Result<Connection, StoreError> {
    let user_id_str: String = row.get("user_id");
    let access_token_ref: String = row.get("access_token_ref");
    let refresh_token_ref: String = row.get("refresh_token_ref");
    let expires_at_str: String = row.get("expires_at");
    let scopes_str: String = row.get("scopes");
    let access_attempts: i64 = row.get("access_attempts");
    let connected_at_str: String = row.get("connected_at");

    let user_id = parse_user_id(&user_id_str)?;
    let expires_at = parse_datetime(&expires_at_str)?;
    let connected_at = parse_datetime(&connected_at_str)?;
    let scopes: Vec<String> = serde_json::from_str(&scopes_str)
        .map_err(|e| StoreError::SerializationError(format!("Invalid scopes JSON: {}", e)))?;

    Ok(Connection::from_parts(
        user_id,
        access_token_ref,
        refresh_token_ref,
        expires_at,
        scopes,
        access_attempts as u64,
        connected_at,
    ))
}

/// Reconstruct SyncSettings from a database row
fn settings_from_row(row: &SqliteRow) -> Result<SyncSettings, StoreError> {
    let user_id_str: String = row.get("user_id");
    let folder_id_str: String = row.get("folder_id");
    let folder_name: String = row.get("folder_name");
    let folder_path: String = row.get("folder_path");
    let downloads_enabled: i64 = row.get("downloads_enabled");
    let updated_at_str: String = row.get("updated_at");

    Ok(SyncSettings::from_parts(
        parse_user_id(&user_id_str)?,
        parse_folder_id(&folder_id_str)?,
        folder_name,
        folder_path,
        downloads_enabled != 0,
        parse_datetime(&updated_at_str)?,
    ))
}

/// Reconstruct a SyncState from a database row
fn sync_state_from_row(row: &SqliteRow) -> Result<SyncState, StoreError> {
    let user_id_str: String = row.get("user_id");
    let root_folder_id_str: String = row.get("root_folder_id");
    let pending_str: String = row.get("pending");
    let start_page_token_str: Option<String> = row.get("start_page_token");
    let status_str: String = row.get("status");
    let last_full_scan_at_str: Option<String> = row.get("last_full_scan_at");
    let last_changes_at_str: Option<String> = row.get("last_changes_at");

    let pending: Vec<PendingFolder> = serde_json::from_str(&pending_str)
        .map_err(|e| StoreError::SerializationError(format!("Invalid pending JSON: {}", e)))?;

    let start_page_token = match start_page_token_str {
        Some(ref s) if !s.is_empty() => Some(PageToken::new(s.clone()).map_err(|e| {
            StoreError::SerializationError(format!("Invalid PageToken '{}': {}", s, e))
        })?),
        _ => None,
    };

    Ok(SyncState::from_parts(
        parse_user_id(&user_id_str)?,
        parse_folder_id(&root_folder_id_str)?,
        pending,
        start_page_token,
        sync_status_from_string(&status_str)?,
        parse_optional_datetime(last_full_scan_at_str)?,
        parse_optional_datetime(last_changes_at_str)?,
    ))
}

/// Reconstruct a MirrorItem from a database row
fn mirror_item_from_row(row: &SqliteRow) -> Result<MirrorItem, StoreError> {
    let user_id_str: String = row.get("user_id");
    let item_key_str: String = row.get("item_key");
    let name: String = row.get("name");
    let mime_type: String = row.get("mime_type");
    let parent_folder_id_str: String = row.get("parent_folder_id");
    let thumbnail_link: Option<String> = row.get("thumbnail_link");
    let web_view_link: Option<String> = row.get("web_view_link");
    let video_str: Option<String> = row.get("video");
    let trashed: i64 = row.get("trashed");
    let discovered_at_str: String = row.get("discovered_at");
    let updated_at_str: String = row.get("updated_at");

    let video: Option<VideoMetadata> = match video_str {
        Some(ref s) if !s.is_empty() => Some(serde_json::from_str(s).map_err(|e| {
            StoreError::SerializationError(format!("Invalid video metadata JSON: {}", e))
        })?),
        _ => None,
    };

    Ok(MirrorItem::from_parts(
        parse_user_id(&user_id_str)?,
        parse_item_key(&item_key_str)?,
        name,
        mime_type,
        parse_folder_id(&parent_folder_id_str)?,
        thumbnail_link,
        web_view_link,
        video,
        trashed != 0,
        parse_datetime(&discovered_at_str)?,
        parse_datetime(&updated_at_str)?,
    ))
}

/// Reconstruct an AuditEntry from a database row
fn audit_entry_from_row(row: &SqliteRow) -> Result<AuditEntry, StoreError> {
    let id: i64 = row.get("id");
    let timestamp_str: String = row.get("timestamp");
    let user_id_str: Option<String> = row.get("user_id");
    let action_str: String = row.get("action");
    let result_str: String = row.get("result");
    let trace_id_str: Option<String> = row.get("trace_id");
    let duration_ms: Option<i64> = row.get("duration_ms");
    let details_str: Option<String> = row.get("details");

    let timestamp = parse_datetime(&timestamp_str)?;

    let user_id = match &user_id_str {
        Some(s) if !s.is_empty() => Some(parse_user_id(s)?),
        _ => None,
    };

    // Actions are stored as their snake_case serde names
    let action: AuditAction = serde_json::from_str(&format!("\"{}\"", action_str))
        .map_err(|e| {
            StoreError::SerializationError(format!("Invalid AuditAction '{}': {}", action_str, e))
        })?;

    let result: AuditResult = serde_json::from_str(&result_str)
        .map_err(|e| StoreError::SerializationError(format!("Invalid AuditResult JSON: {}", e)))?;

    let trace_id = match &trace_id_str {
        Some(s) if !s.is_empty() => Some(TraceId::from_str(s).map_err(|e| {
            StoreError::SerializationError(format!("Invalid TraceId '{}': {}", s, e))
        })?),
        _ => None,
    };

    let details: Option<serde_json::Value> = match details_str {
        Some(ref s) if !s.is_empty() => Some(serde_json::from_str(s).map_err(|e| {
            StoreError::SerializationError(format!("Invalid details JSON: {}", e))
        })?),
        _ => None,
    };

    Ok(AuditEntry::from_parts(
        Some(id),
        timestamp,
        user_id,
        action,
        result,
        trace_id,
        duration_ms.map(|d| d as u64),
        details,
    ))
}

// ============================================================================
// IStateStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IStateStore for SqliteStateStore {
    // --- Connection operations ---

    async fn save_connection(&self, connection: &Connection) -> anyhow::Result<()> {
        let scopes = serde_json::to_string(connection.scopes())
            .map_err(|e| anyhow::anyhow!("Failed to serialize scopes: {}", e))?;

        sqlx::query(
            "INSERT OR REPLACE INTO connections \
             (user_id, access_token_ref, refresh_token_ref, expires_at, \
              scopes, access_attempts, connected_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(connection.user_id().to_string())
        .bind(connection.access_token_ref())
        .bind(connection.refresh_token_ref())
        .bind(connection.expires_at().to_rfc3339())
        .bind(scopes)
        .bind(connection.access_attempts() as i64)
        .bind(connection.connected_at().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(user_id = %connection.user_id(), "Connection saved");
        Ok(())
    }

    async fn get_connection(&self, user_id: &UserId) -> anyhow::Result<Option<Connection>> {
        let row = sqlx::query("SELECT * FROM connections WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(connection_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn delete_connection(&self, user_id: &UserId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM connections WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        tracing::trace!(user_id = %user_id, "Connection deleted");
        Ok(())
    }

    // --- Settings operations ---

    async fn save_settings(&self, settings: &SyncSettings) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_settings \
             (user_id, folder_id, folder_name, folder_path, downloads_enabled, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(settings.user_id().to_string())
        .bind(settings.folder_id().as_str())
        .bind(settings.folder_name())
        .bind(settings.folder_path())
        .bind(settings.downloads_enabled() as i64)
        .bind(settings.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(
            user_id = %settings.user_id(),
            folder_id = %settings.folder_id(),
            "Settings saved"
        );
        Ok(())
    }

    async fn get_settings(&self, user_id: &UserId) -> anyhow::Result<Option<SyncSettings>> {
        let row = sqlx::query("SELECT * FROM sync_settings WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(settings_from_row(r)?)),
            None => Ok(None),
        }
    }

    // --- Sync state operations ---

    async fn save_sync_state(&self, state: &SyncState) -> anyhow::Result<()> {
        let pending = serde_json::to_string(state.pending())
            .map_err(|e| anyhow::anyhow!("Failed to serialize pending queue: {}", e))?;

        sqlx::query(
            "INSERT OR REPLACE INTO sync_state \
             (user_id, root_folder_id, pending, start_page_token, status, \
              last_full_scan_at, last_changes_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(state.user_id().to_string())
        .bind(state.root_folder_id().as_str())
        .bind(pending)
        .bind(state.start_page_token().map(|t| t.as_str().to_string()))
        .bind(sync_status_to_string(state.status()))
        .bind(state.last_full_scan_at().map(|dt| dt.to_rfc3339()))
        .bind(state.last_changes_at().map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(
            user_id = %state.user_id(),
            status = %state.status(),
            queued = state.queued(),
            "Sync state checkpoint saved"
        );
        Ok(())
    }

    async fn get_sync_state(&self, user_id: &UserId) -> anyhow::Result<Option<SyncState>> {
        let row = sqlx::query("SELECT * FROM sync_state WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(sync_state_from_row(r)?)),
            None => Ok(None),
        }
    }

    // --- Mirror catalog operations ---

    async fn upsert_item(&self, item: &MirrorItem) -> anyhow::Result<()> {
        let video = match item.video() {
            Some(v) => Some(
                serde_json::to_string(v)
                    .map_err(|e| anyhow::anyhow!("Failed to serialize video metadata: {}", e))?,
            ),
            None => None,
        };

        sqlx::query(
            "INSERT OR REPLACE INTO mirror_items \
             (user_id, item_key, name, mime_type, parent_folder_id, \
              thumbnail_link, web_view_link, video, trashed, discovered_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.user_id().to_string())
        .bind(item.item_key().as_str())
        .bind(item.name())
        .bind(item.mime_type())
        .bind(item.parent_folder_id().as_str())
        .bind(item.thumbnail_link())
        .bind(item.web_view_link())
        .bind(video)
        .bind(item.is_trashed() as i64)
        .bind(item.discovered_at().to_rfc3339())
        .bind(item.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(
            user_id = %item.user_id(),
            item_key = %item.item_key(),
            "Catalog item upserted"
        );
        Ok(())
    }

    async fn get_item(
        &self,
        user_id: &UserId,
        item_key: &ItemKey,
    ) -> anyhow::Result<Option<MirrorItem>> {
        let row = sqlx::query("SELECT * FROM mirror_items WHERE user_id = ? AND item_key = ?")
            .bind(user_id.to_string())
            .bind(item_key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(mirror_item_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn mark_item_trashed(
        &self,
        user_id: &UserId,
        item_key: &ItemKey,
    ) -> anyhow::Result<()> {
        // An unknown row is not an error: changes feeds report removals
        // for items that were never inside the mirrored subtree.
        let result = sqlx::query(
            "UPDATE mirror_items SET trashed = 1, updated_at = ? \
             WHERE user_id = ? AND item_key = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(user_id.to_string())
        .bind(item_key.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::trace!(user_id = %user_id, item_key = %item_key, "Catalog item trashed");
        }
        Ok(())
    }

    async fn count_items(&self, user_id: &UserId) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mirror_items WHERE user_id = ? AND trashed = 0",
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn count_trashed_items(&self, user_id: &UserId) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mirror_items WHERE user_id = ? AND trashed = 1",
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn list_items_in_folder(
        &self,
        user_id: &UserId,
        parent: &FolderId,
    ) -> anyhow::Result<Vec<MirrorItem>> {
        let rows = sqlx::query(
            "SELECT * FROM mirror_items \
             WHERE user_id = ? AND parent_folder_id = ? AND trashed = 0 \
             ORDER BY name ASC",
        )
        .bind(user_id.to_string())
        .bind(parent.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(mirror_item_from_row(row)?);
        }
        Ok(items)
    }

    async fn is_known_parent(
        &self,
        user_id: &UserId,
        folder_id: &FolderId,
    ) -> anyhow::Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mirror_items \
             WHERE user_id = ? AND parent_folder_id = ? LIMIT 1",
        )
        .bind(user_id.to_string())
        .bind(folder_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    // --- Audit operations ---

    async fn save_audit(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        let result = serde_json::to_string(entry.result())
            .map_err(|e| anyhow::anyhow!("Failed to serialize audit result: {}", e))?;
        let details = match entry.details() {
            Some(d) => Some(
                serde_json::to_string(d)
                    .map_err(|e| anyhow::anyhow!("Failed to serialize audit details: {}", e))?,
            ),
            None => None,
        };

        sqlx::query(
            "INSERT INTO audit_log \
             (timestamp, user_id, action, result, trace_id, duration_ms, details) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.timestamp().to_rfc3339())
        .bind(entry.user_id().map(|u| u.to_string()))
        .bind(entry.action().to_string())
        .bind(result)
        .bind(entry.trace_id().map(|t| t.to_string()))
        .bind(entry.duration_ms().map(|d| d as i64))
        .bind(details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_audit_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM audit_log WHERE timestamp >= ? \
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(since.to_rfc3339())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(audit_entry_from_row(row)?);
        }
        Ok(entries)
    }
}
