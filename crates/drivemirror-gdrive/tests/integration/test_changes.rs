//! Integration tests for change-cursor queries
//!
//! Verifies end-to-end behavior of the changes module against a
//! wiremock-based Drive API mock server:
//! - Head cursor capture
//! - Feed drains with mixed update and removal records
//! - Pagination across multiple pages
//! - Non-consuming change counts

use drivemirror_core::domain::newtypes::PageToken;
use drivemirror_core::ports::drive_provider::{IDriveProvider, ProviderError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn cursor(token: &str) -> PageToken {
    PageToken::new(token.to_string()).unwrap()
}

#[tokio::test]
async fn test_latest_change_cursor() {
    let (server, provider) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "startPageToken": "18764"
        })))
        .mount(&server)
        .await;

    let token = provider
        .latest_change_cursor(common::TEST_TOKEN)
        .await
        .expect("Cursor capture failed");
    assert_eq!(token.as_str(), "18764");
}

#[tokio::test]
async fn test_list_changes_mixed_records() {
    let (server, provider) = common::setup_drive_mock().await;

    common::mount_changes_single_page(
        &server,
        "18764",
        serde_json::json!([
            {
                "fileId": "file-001",
                "removed": false,
                "file": {
                    "id": "file-001",
                    "name": "renamed.jpg",
                    "mimeType": "image/jpeg",
                    "parents": ["root01"]
                }
            },
            {
                "fileId": "file-002",
                "removed": true
            }
        ]),
        "18801",
    )
    .await;

    let batch = provider
        .list_changes(common::TEST_TOKEN, &cursor("18764"))
        .await
        .expect("Changes drain failed");

    assert_eq!(batch.changes.len(), 2);
    assert_eq!(batch.new_cursor.as_str(), "18801");

    let update = &batch.changes[0];
    assert!(!update.removed);
    assert_eq!(update.item.as_ref().unwrap().name, "renamed.jpg");

    let removal = &batch.changes[1];
    assert!(removal.removed);
    assert_eq!(removal.item_id, "file-002");
    assert!(removal.item.is_none());
}

#[tokio::test]
async fn test_list_changes_drains_pagination() {
    let (server, provider) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes"))
        .and(query_param("pageToken", "18764"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "changes": [
                { "fileId": "file-001", "removed": false,
                  "file": { "id": "file-001", "name": "a.jpg", "mimeType": "image/jpeg" } }
            ],
            "nextPageToken": "18770"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/changes"))
        .and(query_param("pageToken", "18770"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "changes": [
                { "fileId": "file-002", "removed": true }
            ],
            "newStartPageToken": "18801"
        })))
        .mount(&server)
        .await;

    let batch = provider
        .list_changes(common::TEST_TOKEN, &cursor("18764"))
        .await
        .expect("Paginated drain failed");

    assert_eq!(batch.changes.len(), 2);
    assert_eq!(batch.changes[0].item_id, "file-001");
    assert_eq!(batch.changes[1].item_id, "file-002");
    assert_eq!(batch.new_cursor.as_str(), "18801");
}

#[tokio::test]
async fn test_list_changes_empty_feed() {
    let (server, provider) = common::setup_drive_mock().await;
    common::mount_changes_single_page(&server, "18801", serde_json::json!([]), "18801").await;

    let batch = provider
        .list_changes(common::TEST_TOKEN, &cursor("18801"))
        .await
        .expect("Empty drain failed");

    assert!(batch.changes.is_empty());
    // An idle feed hands the same cursor back
    assert_eq!(batch.new_cursor.as_str(), "18801");
}

#[tokio::test]
async fn test_list_changes_missing_new_cursor_is_decode_error() {
    let (server, provider) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "changes": []
        })))
        .mount(&server)
        .await;

    let err = provider
        .list_changes(common::TEST_TOKEN, &cursor("18764"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}

#[tokio::test]
async fn test_count_changes_does_not_advance_cursor() {
    let (server, provider) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes"))
        .and(query_param("pageToken", "18764"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "changes": [
                { "fileId": "file-001", "removed": false,
                  "file": { "id": "file-001", "name": "a.jpg", "mimeType": "image/jpeg" } },
                { "fileId": "file-002", "removed": true },
                { "fileId": "file-003", "removed": false,
                  "file": { "id": "file-003", "name": "c.jpg", "mimeType": "image/jpeg" } }
            ],
            "newStartPageToken": "18801"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let count = provider
        .count_changes(common::TEST_TOKEN, &cursor("18764"))
        .await
        .expect("Count failed");
    assert_eq!(count, 3);

    // A second count from the same cursor sees the same records
    let count_again = provider
        .count_changes(common::TEST_TOKEN, &cursor("18764"))
        .await
        .expect("Second count failed");
    assert_eq!(count_again, 3);
}

#[tokio::test]
async fn test_changes_unauthorized() {
    let (server, provider) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .mount(&server)
        .await;

    let err = provider
        .latest_change_cursor("expired-token")
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}
