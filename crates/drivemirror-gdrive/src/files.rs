//! Folder children listings via the Drive v3 files endpoint
//!
//! Lists the immediate children of one folder with
//! `GET /files?q='{id}' in parents`, draining `nextPageToken` pagination
//! internally so callers never observe a partially listed folder.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use drivemirror_core::domain::newtypes::FolderId;
use drivemirror_core::ports::drive_provider::{ProviderError, RemoteItem, VideoInfo};

use crate::client::DriveClient;

/// MIME type Google Drive assigns to folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for every file resource
pub(crate) const FILE_FIELDS: &str = "id,name,mimeType,parents,thumbnailLink,webViewLink,\
                                      trashed,modifiedTime,videoMediaMetadata(width,height,durationMillis)";

/// Page size for children listings (the Drive API maximum)
const PAGE_SIZE: &str = "1000";

// ============================================================================
// Drive API response types (JSON deserialization)
// ============================================================================

/// Raw response from `GET /files`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    /// One page of matching files
    #[serde(default)]
    files: Vec<DriveFile>,
    /// Token for the next page, when more results exist
    next_page_token: Option<String>,
}

/// A file resource from the Drive API
///
/// Fields use camelCase to match the JSON format. Deleted change records
/// omit almost everything, so every field except `id` tolerates absence.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveFile {
    /// Opaque Drive file id
    pub(crate) id: String,
    /// Display name
    #[serde(default)]
    pub(crate) name: String,
    /// MIME type; folders carry `application/vnd.google-apps.folder`
    #[serde(default)]
    pub(crate) mime_type: String,
    /// Parent folder ids (Drive reports at most one for My Drive files)
    pub(crate) parents: Option<Vec<String>>,
    /// Short-lived thumbnail URL
    pub(crate) thumbnail_link: Option<String>,
    /// Browser link for opening the item
    pub(crate) web_view_link: Option<String>,
    /// Whether the item sits in the Drive trash
    #[serde(default)]
    pub(crate) trashed: bool,
    /// Last modified date and time in ISO 8601 format
    pub(crate) modified_time: Option<DateTime<Utc>>,
    /// Video metadata, present on processed video files
    pub(crate) video_media_metadata: Option<DriveVideoMetadata>,
}

/// Video metadata facet of a file resource
///
/// Drive reports the duration as a string of milliseconds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveVideoMetadata {
    pub(crate) width: Option<u32>,
    pub(crate) height: Option<u32>,
    pub(crate) duration_millis: Option<String>,
}

/// Converts a Drive API file resource into the port-level `RemoteItem`
pub(crate) fn remote_item_from_file(file: DriveFile) -> RemoteItem {
    let is_folder = file.mime_type == FOLDER_MIME_TYPE;
    let video = file.video_media_metadata.map(|v| VideoInfo {
        width: v.width,
        height: v.height,
        duration_ms: v.duration_millis.and_then(|d| d.parse::<u64>().ok()),
    });

    RemoteItem {
        id: file.id,
        name: file.name,
        mime_type: file.mime_type,
        parent_id: file.parents.and_then(|p| p.into_iter().next()),
        is_folder,
        thumbnail_link: file.thumbnail_link,
        web_view_link: file.web_view_link,
        trashed: file.trashed,
        video,
        modified: file.modified_time,
    }
}

// ============================================================================
// Listing functions
// ============================================================================

/// Lists the complete immediate children of a folder
///
/// Follows `nextPageToken` pagination until the listing is exhausted.
/// Items already in the Drive trash are excluded; trash transitions reach
/// the catalog through the changes feed instead.
pub async fn list_children(
    client: &DriveClient,
    access_token: &str,
    folder_id: &FolderId,
) -> Result<Vec<RemoteItem>, ProviderError> {
    let query = format!("'{}' in parents and trashed = false", folder_id.as_str());
    let fields = format!("nextPageToken,files({})", FILE_FIELDS);

    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut page_count: u32 = 0;

    loop {
        page_count += 1;
        let mut params = vec![
            ("q", query.as_str()),
            ("fields", fields.as_str()),
            ("pageSize", PAGE_SIZE),
        ];
        if let Some(ref token) = page_token {
            params.push(("pageToken", token.as_str()));
        }

        let response = client.get_with_retry("/files", access_token, &params).await?;
        let page: DriveFileList = client.decode(response).await?;

        debug!(
            folder_id = %folder_id,
            page = page_count,
            items = page.files.len(),
            has_next = page.next_page_token.is_some(),
            "Received children page"
        );

        items.extend(page.files.into_iter().map(remote_item_from_file));

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    debug!(
        folder_id = %folder_id,
        total_items = items.len(),
        total_pages = page_count,
        "Children listing complete"
    );
    Ok(items)
}

// ============================================================================
// Tests
// ============================================================================
