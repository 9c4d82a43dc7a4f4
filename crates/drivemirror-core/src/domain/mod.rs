//! Domain entities and business logic
//!
//! This module contains the core domain types for DriveMirror:
//! - Newtypes for type-safe identifiers and validated domain types
//! - The OAuth connection entity and its status reporting
//! - Persisted sync settings (the user's chosen mirror root)
//! - The durable crawl state machine
//! - Mirrored catalog items
//! - Audit entries for the credential-access side channel
//! - Domain-specific error types

pub mod audit;
pub mod connection;
pub mod errors;
pub mod mirror_item;
pub mod newtypes;
pub mod settings;
pub mod sync_state;

// Re-export commonly used types
pub use audit::{AuditAction, AuditEntry, AuditResult};
pub use connection::{AuthReason, Connection, ConnectionStatus};
pub use errors::{DomainError, SyncError};
pub use mirror_item::{MirrorItem, VideoMetadata};
pub use newtypes::*;
pub use settings::SyncSettings;
pub use sync_state::{PendingFolder, SyncState, SyncStatus};
