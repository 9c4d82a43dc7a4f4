//! Integration tests for drivemirror-gdrive
//!
//! Uses wiremock to simulate the Google Drive v3 API and verifies
//! end-to-end behavior of the DriveClient, children listings, and
//! change-cursor queries.

mod common;

mod test_changes;
mod test_files;
