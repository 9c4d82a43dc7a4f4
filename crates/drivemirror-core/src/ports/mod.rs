//! Ports (interfaces) for the hexagonal architecture
//!
//! Ports define the boundaries between the core domain and the outside
//! world. They are implemented by adapters in the other crates:
//! - `IDriveProvider` — implemented by `drivemirror-gdrive` (Google Drive v3)
//! - `IStateStore` — implemented by `drivemirror-store` (SQLite)
//! - `ICredentialVault` — implemented by the OS keyring adapter in
//!   `drivemirror-gdrive`

pub mod credential_vault;
pub mod drive_provider;
pub mod state_store;

pub use credential_vault::ICredentialVault;
pub use drive_provider::{
    ChangeBatch, ChangeRecord, IDriveProvider, ProviderError, RemoteItem, Tokens, VideoInfo,
};
pub use state_store::IStateStore;
