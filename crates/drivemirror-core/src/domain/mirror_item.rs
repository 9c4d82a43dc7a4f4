//! Mirrored catalog item
//!
//! One discovered remote file. Rows are upserted by the runner during the
//! crawl and updated by the changes puller afterwards. Removals never
//! delete a row: they set the `trashed` flag, which surfaces the item in
//! the virtual-trash view instead of silently dropping it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{FolderId, ItemKey, UserId};
use crate::ports::drive_provider::RemoteItem;

/// Video-specific metadata carried by some mirrored items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Frame width in pixels, when reported
    pub width: Option<u32>,
    /// Frame height in pixels, when reported
    pub height: Option<u32>,
    /// Playback duration in milliseconds, when reported
    pub duration_ms: Option<u64>,
}

/// One mirrored remote file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorItem {
    user_id: UserId,
    item_key: ItemKey,
    name: String,
    mime_type: String,
    parent_folder_id: FolderId,
    thumbnail_link: Option<String>,
    web_view_link: Option<String>,
    video: Option<VideoMetadata>,
    trashed: bool,
    discovered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MirrorItem {
    /// Builds a catalog row from a provider listing entry
    ///
    /// The caller supplies the parent folder explicitly: during a crawl
    /// the listing context is authoritative, and change records may omit
    /// parent information entirely.
    pub fn from_remote(
        user_id: UserId,
        remote: &RemoteItem,
        parent: FolderId,
    ) -> Result<Self, super::errors::DomainError> {
        let item_key = ItemKey::new(remote.id.clone())?;
        let now = Utc::now();
        Ok(Self {
            user_id,
            item_key,
            name: remote.name.clone(),
            mime_type: remote.mime_type.clone(),
            parent_folder_id: parent,
            thumbnail_link: remote.thumbnail_link.clone(),
            web_view_link: remote.web_view_link.clone(),
            video: remote.video.as_ref().map(|v| VideoMetadata {
                width: v.width,
                height: v.height,
                duration_ms: v.duration_ms,
            }),
            trashed: remote.trashed,
            discovered_at: now,
            updated_at: now,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn item_key(&self) -> &ItemKey {
        &self.item_key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn parent_folder_id(&self) -> &FolderId {
        &self.parent_folder_id
    }

    pub fn thumbnail_link(&self) -> Option<&str> {
        self.thumbnail_link.as_deref()
    }

    pub fn web_view_link(&self) -> Option<&str> {
        self.web_view_link.as_deref()
    }

    pub fn video(&self) -> Option<&VideoMetadata> {
        self.video.as_ref()
    }

    pub fn is_trashed(&self) -> bool {
        self.trashed
    }

    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies updated remote metadata in place
    pub fn apply_remote(&mut self, remote: &RemoteItem) {
        self.name = remote.name.clone();
        self.mime_type = remote.mime_type.clone();
        self.thumbnail_link = remote.thumbnail_link.clone();
        self.web_view_link = remote.web_view_link.clone();
        self.video = remote.video.as_ref().map(|v| VideoMetadata {
            width: v.width,
            height: v.height,
            duration_ms: v.duration_ms,
        });
        self.trashed = remote.trashed;
        self.updated_at = Utc::now();
    }

    /// Moves the item under a different parent folder
    pub fn reparent(&mut self, parent: FolderId) {
        self.parent_folder_id = parent;
        self.updated_at = Utc::now();
    }

    /// Moves the item into the virtual trash
    pub fn mark_trashed(&mut self) {
        self.trashed = true;
        self.updated_at = Utc::now();
    }

    /// Reconstructs an item from persisted fields (repository use)
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        user_id: UserId,
        item_key: ItemKey,
        name: String,
        mime_type: String,
        parent_folder_id: FolderId,
        thumbnail_link: Option<String>,
        web_view_link: Option<String>,
        video: Option<VideoMetadata>,
        trashed: bool,
        discovered_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            item_key,
            name,
            mime_type,
            parent_folder_id,
            thumbnail_link,
            web_view_link,
            video,
            trashed,
            discovered_at,
            updated_at,
        }
    }
}
