//! Reason codes for audit log entries
//!
//! Provides stable codes for categorizing why an operation failed. The
//! codes are part of the audit record format: support tooling filters on
//! them, so the strings never change even when error messages do.

use std::fmt;

use serde::{Deserialize, Serialize};

use drivemirror_core::domain::{AuthReason, SyncError};

/// Stable reason codes for failed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// The access token expired and the refresh was rejected
    TokenExpired,
    /// No access token is stored for the user
    NoAccessToken,
    /// The stored token expired and no refresh token exists
    Expired,
    /// The granted scopes no longer cover what the engine needs
    ScopeMissing,
    /// The armed crawl root does not match the configured folder
    RootMismatch,
    /// No mirror folder has been configured
    NoFolderConfigured,
    /// Sync has not been armed
    NotArmed,
    /// The change cursor is missing; no full crawl has completed
    CursorMissing,
    /// The remote provider rejected or failed a request
    ProviderError,
    /// The state store failed
    StorageError,
    /// The interactive consent flow failed before the code exchange
    AuthFlowFailed,
    /// Unrecoverable failure
    Fatal,
}

impl ReasonCode {
    /// Returns the stable string code stored in audit records
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::TokenExpired => "TOKEN_EXPIRED",
            ReasonCode::NoAccessToken => "NO_ACCESS_TOKEN",
            ReasonCode::Expired => "EXPIRED",
            ReasonCode::ScopeMissing => "SCOPE_MISSING",
            ReasonCode::RootMismatch => "ROOT_MISMATCH",
            ReasonCode::NoFolderConfigured => "NO_FOLDER_CONFIGURED",
            ReasonCode::NotArmed => "NOT_ARMED",
            ReasonCode::CursorMissing => "CURSOR_MISSING",
            ReasonCode::ProviderError => "PROVIDER_ERROR",
            ReasonCode::StorageError => "STORAGE_ERROR",
            ReasonCode::AuthFlowFailed => "AUTH_FLOW_FAILED",
            ReasonCode::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&SyncError> for ReasonCode {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::TokenExpired => ReasonCode::TokenExpired,
            SyncError::AuthRequired(AuthReason::NoAccessToken) => ReasonCode::NoAccessToken,
            SyncError::AuthRequired(AuthReason::Expired) => ReasonCode::Expired,
            SyncError::AuthRequired(AuthReason::ScopeMissing) => ReasonCode::ScopeMissing,
            SyncError::RootMismatch { .. } => ReasonCode::RootMismatch,
            SyncError::NoFolderConfigured => ReasonCode::NoFolderConfigured,
            SyncError::NotArmed => ReasonCode::NotArmed,
            SyncError::CursorMissing => ReasonCode::CursorMissing,
            SyncError::Provider(_) => ReasonCode::ProviderError,
            SyncError::Storage(_) => ReasonCode::StorageError,
            SyncError::Fatal { .. } => ReasonCode::Fatal,
        }
    }
}
