//! Integration tests for folder children listings
//!
//! Verifies end-to-end behavior of `list_children` against a
//! wiremock-based Drive API mock server:
//! - Single-page listings with mixed item types
//! - Pagination across multiple pages
//! - Error classification (401, 404)
//! - 429 backoff and retry

use drivemirror_core::domain::newtypes::FolderId;
use drivemirror_core::ports::drive_provider::{IDriveProvider, ProviderError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn folder(id: &str) -> FolderId {
    FolderId::new(id.to_string()).unwrap()
}

#[tokio::test]
async fn test_list_children_mixed_items() {
    let (server, provider) = common::setup_drive_mock().await;

    common::mount_children_single_page(
        &server,
        serde_json::json!([
            {
                "id": "folder-001",
                "name": "Vacation",
                "mimeType": "application/vnd.google-apps.folder",
                "parents": ["root01"]
            },
            {
                "id": "file-001",
                "name": "photo.jpg",
                "mimeType": "image/jpeg",
                "parents": ["root01"],
                "thumbnailLink": "https://lh3.googleusercontent.com/t/abc",
                "webViewLink": "https://drive.google.com/file/d/file-001/view",
                "modifiedTime": "2026-07-01T14:00:00Z"
            },
            {
                "id": "file-002",
                "name": "clip.mp4",
                "mimeType": "video/mp4",
                "parents": ["root01"],
                "videoMediaMetadata": {
                    "width": 1920,
                    "height": 1080,
                    "durationMillis": "42000"
                }
            }
        ]),
    )
    .await;

    let items = provider
        .list_children(common::TEST_TOKEN, &folder("root01"))
        .await
        .expect("Children listing failed");

    assert_eq!(items.len(), 3);

    let subfolder = &items[0];
    assert!(subfolder.is_folder);
    assert_eq!(subfolder.name, "Vacation");

    let photo = &items[1];
    assert!(!photo.is_folder);
    assert!(photo.thumbnail_link.is_some());
    assert!(photo.modified.is_some());

    let video = items[2].video.as_ref().expect("Missing video metadata");
    assert_eq!(video.duration_ms, Some(42_000));
}

#[tokio::test]
async fn test_list_children_drains_pagination() {
    let server = MockServer::start().await;

    // The page-2 mock must be mounted first: wiremock picks the first
    // matching mock, and the page-1 mock matches any GET /files.
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": "file-002", "name": "b.jpg", "mimeType": "image/jpeg" }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": "file-001", "name": "a.jpg", "mimeType": "image/jpeg" }
            ],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let client = drivemirror_gdrive::client::DriveClient::with_base_url(server.uri());
    let provider = drivemirror_gdrive::GoogleDriveProvider::with_client(
        &drivemirror_gdrive::DriveAuthConfig::new("test-client-id"),
        client,
    )
    .unwrap();

    let items = provider
        .list_children(common::TEST_TOKEN, &folder("root01"))
        .await
        .expect("Paginated listing failed");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "file-001");
    assert_eq!(items[1].id, "file-002");
}

#[tokio::test]
async fn test_list_children_empty_folder() {
    let (server, provider) = common::setup_drive_mock().await;
    common::mount_children_single_page(&server, serde_json::json!([])).await;

    let items = provider
        .list_children(common::TEST_TOKEN, &folder("empty01"))
        .await
        .expect("Empty listing failed");
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_list_children_unauthorized() {
    let (server, provider) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "code": 401, "message": "Invalid Credentials" }
        })))
        .mount(&server)
        .await;

    let err = provider
        .list_children("expired-token", &folder("root01"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Unauthorized(_)));
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_list_children_not_found() {
    let (server, provider) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": 404, "message": "File not found" }
        })))
        .mount(&server)
        .await;

    let err = provider
        .list_children(common::TEST_TOKEN, &folder("gone01"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_list_children_retries_after_429() {
    let (server, provider) = common::setup_drive_mock().await;

    // First call throttled, second succeeds
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": "file-001", "name": "a.jpg", "mimeType": "image/jpeg" }
            ]
        })))
        .mount(&server)
        .await;

    let items = provider
        .list_children(common::TEST_TOKEN, &folder("root01"))
        .await
        .expect("Listing should succeed after retry");
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_list_children_server_error() {
    let (server, provider) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;

    let err = provider
        .list_children(common::TEST_TOKEN, &folder("root01"))
        .await
        .unwrap_err();

    match err {
        ProviderError::Http { status, .. } => assert_eq!(status, 500),
        other => panic!("Expected Http error, got {:?}", other),
    }
}
