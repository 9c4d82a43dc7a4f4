//! Sync settings entity
//!
//! The user's chosen mirror root. Pure configuration: upserted whenever the
//! user picks or changes a folder, never deleted implicitly, and
//! deliberately decoupled from the crawl state so a folder change can be
//! staged before a sync is actually (re)armed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{FolderId, UserId};

/// Persisted mirror-root configuration for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    user_id: UserId,
    folder_id: FolderId,
    folder_name: String,
    folder_path: String,
    downloads_enabled: bool,
    updated_at: DateTime<Utc>,
}

impl SyncSettings {
    /// Creates settings for a newly chosen folder
    pub fn new(
        user_id: UserId,
        folder_id: FolderId,
        folder_name: impl Into<String>,
        folder_path: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            folder_id,
            folder_name: folder_name.into(),
            folder_path: folder_path.into(),
            downloads_enabled: true,
            updated_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn folder_id(&self) -> &FolderId {
        &self.folder_id
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    pub fn downloads_enabled(&self) -> bool {
        self.downloads_enabled
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Enables or disables content downloads for this mirror
    pub fn set_downloads_enabled(&mut self, enabled: bool) {
        self.downloads_enabled = enabled;
        self.updated_at = Utc::now();
    }

    /// Reconstructs settings from persisted fields (repository use)
    pub fn from_parts(
        user_id: UserId,
        folder_id: FolderId,
        folder_name: String,
        folder_path: String,
        downloads_enabled: bool,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            folder_id,
            folder_name,
            folder_path,
            downloads_enabled,
            updated_at,
        }
    }
}
