//! Domain error types
//!
//! Two error layers live here. `DomainError` covers construction-time
//! validation of newtypes and entities. `SyncError` is the tagged result
//! type returned by every use case: recoverability is encoded in the
//! variant, never inferred from message strings.

use thiserror::Error;

use super::connection::AuthReason;
use super::newtypes::TraceId;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid identifier format or content
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// Invalid remote folder identifier
    #[error("Invalid folder id: {0}")]
    InvalidFolderId(String),

    /// Invalid remote item key
    #[error("Invalid item key: {0}")]
    InvalidItemKey(String),

    /// Invalid change cursor
    #[error("Invalid page token: {0}")]
    InvalidPageToken(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Outcome classification for every sync-engine operation
///
/// The orchestrator's retry policy dispatches on these variants:
/// auth variants require user action (HTTP-style 401), `RootMismatch`
/// is benign and retried after re-arming (409), everything else is
/// surfaced as fatal with a correlation id (500).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The access token expired and could not be refreshed
    #[error("access token expired and refresh failed")]
    TokenExpired,

    /// Interactive (re-)authorization is required
    #[error("authorization required: {0}")]
    AuthRequired(AuthReason),

    /// The armed crawl root no longer matches the configured folder
    #[error("armed root {armed} does not match configured folder {configured}")]
    RootMismatch {
        /// Root folder id persisted in the sync state
        armed: String,
        /// Folder id currently configured in the settings
        configured: String,
    },

    /// No mirror folder has been configured yet
    #[error("no sync folder configured")]
    NoFolderConfigured,

    /// `start` has not been called; there is no sync state to operate on
    #[error("sync has not been armed")]
    NotArmed,

    /// The change cursor is missing; a full crawl has not completed yet
    #[error("change cursor not initialized; full crawl has not completed")]
    CursorMissing,

    /// The remote provider rejected or failed the request
    #[error("provider error: {0}")]
    Provider(String),

    /// The state store failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Unrecoverable failure, correlated for diagnosis
    #[error("fatal sync failure [{trace_id}]: {message}")]
    Fatal {
        /// Correlation identifier reported to the user
        trace_id: TraceId,
        /// Description of the failure
        message: String,
    },
}

impl SyncError {
    /// HTTP-style status code for the external interface (§6)
    pub fn http_code(&self) -> u16 {
        match self {
            SyncError::TokenExpired | SyncError::AuthRequired(_) => 401,
            SyncError::RootMismatch { .. } => 409,
            SyncError::NoFolderConfigured
            | SyncError::NotArmed
            | SyncError::CursorMissing => 412,
            _ => 500,
        }
    }

    /// Stable machine-readable reason code surfaced to clients
    pub fn reason(&self) -> &'static str {
        match self {
            SyncError::TokenExpired => "TOKEN_EXPIRED",
            SyncError::AuthRequired(AuthReason::NoAccessToken) => "NO_ACCESS_TOKEN",
            SyncError::AuthRequired(AuthReason::Expired) => "EXPIRED",
            SyncError::AuthRequired(AuthReason::ScopeMissing) => "SCOPE_MISSING",
            SyncError::RootMismatch { .. } => "ROOT_MISMATCH",
            SyncError::NoFolderConfigured => "NO_FOLDER_CONFIGURED",
            SyncError::NotArmed => "NOT_ARMED",
            SyncError::CursorMissing => "CURSOR_MISSING",
            SyncError::Provider(_) => "PROVIDER_ERROR",
            SyncError::Storage(_) => "STORAGE_ERROR",
            SyncError::Fatal { .. } => "FATAL",
        }
    }

    /// True if the orchestrator may retry automatically (after re-arming)
    pub fn is_benign_race(&self) -> bool {
        matches!(self, SyncError::RootMismatch { .. })
    }

    /// True if recovery requires interactive user action
    pub fn needs_user_action(&self) -> bool {
        matches!(self, SyncError::TokenExpired | SyncError::AuthRequired(_))
    }

    /// Wraps a storage-layer failure
    pub fn storage(err: impl std::fmt::Display) -> Self {
        SyncError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidFolderId("bad!".to_string());
        assert_eq!(err.to_string(), "Invalid folder id: bad!");

        let err = DomainError::InvalidState {
            from: "Idle".to_string(),
            to: "Syncing".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid state transition from Idle to Syncing");
    }

    #[test]
    fn test_http_codes() {
        assert_eq!(SyncError::TokenExpired.http_code(), 401);
        assert_eq!(
            SyncError::AuthRequired(AuthReason::ScopeMissing).http_code(),
            401
        );
        assert_eq!(
            SyncError::RootMismatch {
                armed: "a".into(),
                configured: "b".into()
            }
            .http_code(),
            409
        );
        assert_eq!(SyncError::Provider("boom".into()).http_code(), 500);
    }

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(SyncError::TokenExpired.reason(), "TOKEN_EXPIRED");
        assert_eq!(
            SyncError::AuthRequired(AuthReason::NoAccessToken).reason(),
            "NO_ACCESS_TOKEN"
        );
        assert_eq!(
            SyncError::RootMismatch {
                armed: "a".into(),
                configured: "b".into()
            }
            .reason(),
            "ROOT_MISMATCH"
        );
        assert_eq!(SyncError::CursorMissing.reason(), "CURSOR_MISSING");
    }

    #[test]
    fn test_policy_classification() {
        assert!(SyncError::RootMismatch {
            armed: "a".into(),
            configured: "b".into()
        }
        .is_benign_race());
        assert!(!SyncError::TokenExpired.is_benign_race());
        assert!(SyncError::TokenExpired.needs_user_action());
        assert!(SyncError::AuthRequired(AuthReason::Expired).needs_user_action());
        assert!(!SyncError::Provider("x".into()).needs_user_action());
    }
}
