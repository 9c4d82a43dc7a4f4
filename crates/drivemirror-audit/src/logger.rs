//! AuditLogger - high-level audit trail service
//!
//! Wraps `IStateStore::save_audit()` with convenience methods for
//! recording failures outside the engine's own write paths, and exposes
//! the read side used for audit reporting. All write methods are
//! non-fatal: errors in audit persistence are logged via
//! `tracing::warn!` but never propagated.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use drivemirror_core::domain::{AuditAction, AuditEntry, AuditResult, SyncError, UserId};
use drivemirror_core::ports::IStateStore;

use crate::reason::ReasonCode;

/// High-level audit service over the state store's audit persistence.
///
/// The engine's use cases append their own lifecycle records; this
/// service covers the surrounding surfaces (interactive flows, reporting)
/// with the same non-fatal write discipline.
pub struct AuditLogger {
    store: Arc<dyn IStateStore>,
}

impl AuditLogger {
    /// Creates a new `AuditLogger` backed by the given state store.
    pub fn new(store: Arc<dyn IStateStore>) -> Self {
        Self { store }
    }

    /// Persist an audit entry, swallowing errors with a tracing warning.
    async fn save(&self, entry: &AuditEntry) {
        if let Err(e) = self.store.save_audit(entry).await {
            tracing::warn!(error = %e, "Failed to save audit entry");
        }
    }

    // ========================================================================
    // Write side
    // ========================================================================

    /// Log a failure with an explicit reason code.
    pub async fn log_failure(
        &self,
        user_id: Option<UserId>,
        reason: ReasonCode,
        message: &str,
    ) {
        let mut entry = AuditEntry::new(
            AuditAction::Error,
            AuditResult::failed(reason.as_str(), message),
        );
        if let Some(user_id) = user_id {
            entry = entry.with_user_id(user_id);
        }
        self.save(&entry).await;
    }

    /// Log an engine error, deriving the reason code from the error.
    pub async fn log_sync_error(&self, user_id: UserId, err: &SyncError) {
        let reason = ReasonCode::from(err);
        let entry = AuditEntry::new(
            AuditAction::Error,
            AuditResult::failed(reason.as_str(), err.to_string()),
        )
        .with_user_id(user_id)
        .with_details(json!({
            "needs_user_action": err.needs_user_action(),
        }));
        self.save(&entry).await;
    }

    // ========================================================================
    // Read side
    // ========================================================================

    /// Returns the most recent audit entries, newest first.
    pub async fn recent(&self, window_hours: i64, limit: u32) -> anyhow::Result<Vec<AuditEntry>> {
        let since = Utc::now() - Duration::hours(window_hours);
        self.store.get_audit_since(since, limit).await
    }

    /// Returns audit entries since an explicit timestamp, newest first.
    pub async fn since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        self.store.get_audit_since(since, limit).await
    }
}
