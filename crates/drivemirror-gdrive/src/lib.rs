//! DriveMirror GDrive - Google Drive API client
//!
//! Provides the async driven adapter for:
//! - OAuth2 authentication (Authorization Code with PKCE)
//! - Children listings via the Drive v3 files endpoint
//! - Change-cursor queries via the Drive v3 changes endpoint
//! - Secure token storage in the OS keyring
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE flow, local callback server, keyring vault
//! - [`client`] - Google Drive API HTTP client
//! - [`files`] - Folder children listings
//! - [`changes`] - Change cursor capture and feed drains
//! - [`provider`] - The `IDriveProvider` implementation tying it together

pub mod auth;
pub mod changes;
pub mod client;
pub mod files;
pub mod provider;

pub use auth::{DriveAuthConfig, KeyringVault, LocalCallbackServer};
pub use client::DriveClient;
pub use provider::GoogleDriveProvider;
