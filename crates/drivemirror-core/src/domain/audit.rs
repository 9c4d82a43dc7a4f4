//! Audit entry domain entities
//!
//! Every credential access and every sync-lifecycle operation appends an
//! audit record. This is a side channel for security review and support
//! diagnosis; sync logic never reads it back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::newtypes::{TraceId, UserId};

/// Actions that can be recorded in the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Stored credential material was read (token manager side channel)
    CredentialAccess,
    /// A consent URL was issued to the user
    AuthorizeUrlIssued,
    /// The consent callback completed and a connection was created
    AuthConnect,
    /// The user disconnected; credentials revoked and deleted
    AuthDisconnect,
    /// The access token was refreshed
    TokenRefresh,
    /// The mirror root folder was configured or changed
    FolderConfigured,
    /// The crawl was (re-)armed
    SyncArmed,
    /// The root's immediate contents were seeded into the queue
    IndexComplete,
    /// One budgeted runner batch completed
    RunBatch,
    /// The changes feed was pulled
    ChangesPull,
    /// An error occurred
    Error,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::CredentialAccess => "credential_access",
            AuditAction::AuthorizeUrlIssued => "authorize_url_issued",
            AuditAction::AuthConnect => "auth_connect",
            AuditAction::AuthDisconnect => "auth_disconnect",
            AuditAction::TokenRefresh => "token_refresh",
            AuditAction::FolderConfigured => "folder_configured",
            AuditAction::SyncArmed => "sync_armed",
            AuditAction::IndexComplete => "index_complete",
            AuditAction::RunBatch => "run_batch",
            AuditAction::ChangesPull => "changes_pull",
            AuditAction::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Result of an audited action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    /// The action completed successfully
    Success,
    /// The action failed with an error code and message
    Failed {
        /// Error code for categorization
        code: String,
        /// Human-readable error message
        message: String,
    },
}

impl AuditResult {
    /// Creates a successful result
    pub fn success() -> Self {
        AuditResult::Success
    }

    /// Creates a failed result with the given code and message
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        AuditResult::Failed {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if the result is a success
    pub fn is_success(&self) -> bool {
        matches!(self, AuditResult::Success)
    }
}

/// An audit log entry recording a significant operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for this audit entry (assigned by database)
    id: Option<i64>,
    /// When the action occurred
    timestamp: DateTime<Utc>,
    /// The user the action was performed for
    user_id: Option<UserId>,
    /// The type of action that was performed
    action: AuditAction,
    /// Whether the action succeeded
    result: AuditResult,
    /// Correlation id, when the action belongs to an orchestrated sync
    trace_id: Option<TraceId>,
    /// Wall-clock duration of the action in milliseconds
    duration_ms: Option<u64>,
    /// Action-specific structured details
    details: Option<Value>,
}

impl AuditEntry {
    /// Creates a new audit entry with the current timestamp
    pub fn new(action: AuditAction, result: AuditResult) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            user_id: None,
            action,
            result,
            trace_id: None,
            duration_ms: None,
            details: None,
        }
    }

    /// Attaches the acting user
    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attaches a correlation id
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Attaches a duration in milliseconds
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attaches structured details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn action(&self) -> &AuditAction {
        &self.action
    }

    pub fn result(&self) -> &AuditResult {
        &self.result
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Reconstructs an entry from persisted fields (repository use)
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: Option<i64>,
        timestamp: DateTime<Utc>,
        user_id: Option<UserId>,
        action: AuditAction,
        result: AuditResult,
        trace_id: Option<TraceId>,
        duration_ms: Option<u64>,
        details: Option<Value>,
    ) -> Self {
        Self {
            id,
            timestamp,
            user_id,
            action,
            result,
            trace_id,
            duration_ms,
            details,
        }
    }
}
