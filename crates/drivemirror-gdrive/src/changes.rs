//! Change cursor capture and feed drains via the Drive v3 changes endpoint
//!
//! Implements the Drive change-token pattern:
//!
//! 1. **Cursor capture**: `GET /changes/startPageToken` returns the head
//!    cursor of the change log. A pull starting from it sees only changes
//!    made after the call.
//! 2. **Feed drain**: `GET /changes?pageToken=...` pages through change
//!    records. The final page carries `newStartPageToken`, the cursor for
//!    the next pull.
//!
//! Reading the feed never consumes the cursor on the provider side, so a
//! peek is just a drain whose new cursor is discarded.

use serde::Deserialize;
use tracing::{debug, warn};

use drivemirror_core::domain::newtypes::PageToken;
use drivemirror_core::ports::drive_provider::{ChangeBatch, ChangeRecord, ProviderError};

use crate::client::DriveClient;
use crate::files::{remote_item_from_file, DriveFile, FILE_FIELDS};

/// Page size for changes listings (the Drive API maximum)
const PAGE_SIZE: &str = "1000";

// ============================================================================
// Drive API response types (JSON deserialization)
// ============================================================================

/// Raw response from `GET /changes/startPageToken`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPageTokenResponse {
    /// Head cursor of the change log
    start_page_token: String,
}

/// Raw response from `GET /changes`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveChangeList {
    /// One page of change records
    #[serde(default)]
    changes: Vec<DriveChange>,
    /// Token for the next page, when more results exist
    next_page_token: Option<String>,
    /// Cursor for the next pull (present only on the last page)
    new_start_page_token: Option<String>,
}

/// A change record from the Drive API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveChange {
    /// Id of the changed file
    file_id: Option<String>,
    /// True when the item was removed or left the caller's view
    #[serde(default)]
    removed: bool,
    /// Current file resource; absent for removed items
    file: Option<DriveFile>,
}

fn change_record(change: DriveChange) -> Option<ChangeRecord> {
    let item = change.file.map(remote_item_from_file);
    let item_id = change
        .file_id
        .or_else(|| item.as_ref().map(|i| i.id.clone()));

    match item_id {
        Some(item_id) => Some(ChangeRecord {
            item_id,
            removed: change.removed,
            item,
        }),
        None => {
            warn!("Dropping change record without a file id");
            None
        }
    }
}

// ============================================================================
// Changes queries
// ============================================================================

/// Fetches the current head cursor of the change log
pub async fn latest_cursor(
    client: &DriveClient,
    access_token: &str,
) -> Result<PageToken, ProviderError> {
    let response = client
        .get_with_retry("/changes/startPageToken", access_token, &[])
        .await?;
    let body: StartPageTokenResponse = client.decode(response).await?;

    debug!(cursor = %body.start_page_token, "Captured change cursor");
    PageToken::new(body.start_page_token).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Drains the change feed from the given cursor
///
/// Follows `nextPageToken` pagination until the final page yields the
/// `newStartPageToken` cursor for the next pull.
pub async fn list_changes(
    client: &DriveClient,
    access_token: &str,
    cursor: &PageToken,
) -> Result<ChangeBatch, ProviderError> {
    let fields = format!(
        "nextPageToken,newStartPageToken,changes(fileId,removed,file({}))",
        FILE_FIELDS
    );

    let mut records = Vec::new();
    let mut page_token = cursor.as_str().to_string();
    let mut page_count: u32 = 0;

    loop {
        page_count += 1;
        let params = [
            ("pageToken", page_token.as_str()),
            ("fields", fields.as_str()),
            ("pageSize", PAGE_SIZE),
        ];

        let response = client.get_with_retry("/changes", access_token, &params).await?;
        let page: DriveChangeList = client.decode(response).await?;

        debug!(
            page = page_count,
            records = page.changes.len(),
            has_next = page.next_page_token.is_some(),
            "Received changes page"
        );

        records.extend(page.changes.into_iter().filter_map(change_record));

        if let Some(next) = page.next_page_token {
            page_token = next;
            continue;
        }

        let new_cursor = page.new_start_page_token.ok_or_else(|| {
            ProviderError::Decode("changes feed ended without newStartPageToken".to_string())
        })?;
        let new_cursor =
            PageToken::new(new_cursor).map_err(|e| ProviderError::Decode(e.to_string()))?;

        debug!(
            total_records = records.len(),
            total_pages = page_count,
            new_cursor = %new_cursor,
            "Changes drain complete"
        );
        return Ok(ChangeBatch {
            changes: records,
            new_cursor,
        });
    }
}

/// Counts pending changes from the given cursor without consuming it
///
/// Drive reads never advance a cursor, so this is a drain that discards
/// everything except the record count.
pub async fn count_changes(
    client: &DriveClient,
    access_token: &str,
    cursor: &PageToken,
) -> Result<u64, ProviderError> {
    let batch = list_changes(client, access_token, cursor).await?;
    Ok(batch.changes.len() as u64)
}

// ============================================================================
// Tests
// ============================================================================
