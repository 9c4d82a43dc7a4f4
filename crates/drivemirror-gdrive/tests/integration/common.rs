//! Shared test helpers for Drive API integration tests
//!
//! Provides wiremock-based mock server setup for Google Drive v3
//! endpoints. Each helper mounts the necessary mock endpoints and
//! returns a provider pointing at the mock server.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_gdrive::client::DriveClient;
use drivemirror_gdrive::{DriveAuthConfig, GoogleDriveProvider};

/// Access token used for every mocked request
pub const TEST_TOKEN: &str = "test-access-token";

/// Sets up a mock server and a provider whose API client targets it.
pub async fn setup_drive_mock() -> (MockServer, GoogleDriveProvider) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url(server.uri());
    let provider = GoogleDriveProvider::with_client(
        &DriveAuthConfig::new("test-client-id"),
        client,
    )
    .expect("Failed to build test provider");

    (server, provider)
}

/// Mounts a children listing that returns a single page with given files.
pub async fn mount_children_single_page(server: &MockServer, files: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": files
        })))
        .mount(server)
        .await;
}

/// Mounts a changes feed that returns a single final page.
pub async fn mount_changes_single_page(
    server: &MockServer,
    cursor: &str,
    changes: serde_json::Value,
    new_cursor: &str,
) {
    Mock::given(method("GET"))
        .and(path("/changes"))
        .and(query_param("pageToken", cursor))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "changes": changes,
            "newStartPageToken": new_cursor
        })))
        .mount(server)
        .await;
}
