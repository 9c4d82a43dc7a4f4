//! OAuth connection entity
//!
//! Represents one user's OAuth grant against the cloud provider. Token
//! values themselves never live in this entity (or in the database); the
//! row carries opaque vault references plus the metadata needed to decide
//! whether a refresh or a new consent is required.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{FolderId, UserId};

/// Why a connection is not usable, surfaced by `status()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthReason {
    /// No credential material is stored at all
    NoAccessToken,
    /// The stored token expired and cannot be refreshed
    Expired,
    /// The grant is missing a scope the engine requires
    ScopeMissing,
}

impl std::fmt::Display for AuthReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthReason::NoAccessToken => "NO_ACCESS_TOKEN",
            AuthReason::Expired => "EXPIRED",
            AuthReason::ScopeMissing => "SCOPE_MISSING",
        };
        write!(f, "{s}")
    }
}

/// Snapshot returned by the token manager's `status()` operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Whether a usable grant exists
    pub connected: bool,
    /// Why not, when `connected` is false
    pub reason: Option<AuthReason>,
    /// The configured mirror root, if any
    pub dedicated_folder_id: Option<FolderId>,
    /// Display name of the configured mirror root
    pub dedicated_folder_name: Option<String>,
    /// Whether content downloads are enabled in the settings
    pub downloads_enabled: bool,
}

/// One user's OAuth grant
///
/// Created on the consent callback, rotated in place on refresh, and
/// deleted on disconnect. Every credential access increments
/// `access_attempts` — a side channel for security review, not for
/// sync logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    user_id: UserId,
    /// Vault reference for the access token secret
    access_token_ref: String,
    /// Vault reference for the refresh token secret
    refresh_token_ref: String,
    expires_at: DateTime<Utc>,
    scopes: Vec<String>,
    access_attempts: u64,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Creates a new connection recorded at the consent callback
    pub fn new(
        user_id: UserId,
        access_token_ref: impl Into<String>,
        refresh_token_ref: impl Into<String>,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            user_id,
            access_token_ref: access_token_ref.into(),
            refresh_token_ref: refresh_token_ref.into(),
            expires_at,
            scopes,
            access_attempts: 0,
            connected_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn access_token_ref(&self) -> &str {
        &self.access_token_ref
    }

    pub fn refresh_token_ref(&self) -> &str {
        &self.refresh_token_ref
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn access_attempts(&self) -> u64 {
        self.access_attempts
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }

    /// Returns true if the grant covers the given scope
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Records one credential access (the audit counter side channel)
    pub fn record_access(&mut self) {
        self.access_attempts += 1;
    }

    /// Rotates expiry and scopes in place after a successful refresh
    pub fn rotate(&mut self, expires_at: DateTime<Utc>, scopes: Vec<String>) {
        self.expires_at = expires_at;
        if !scopes.is_empty() {
            self.scopes = scopes;
        }
    }

    /// Reconstructs a connection from persisted fields (repository use)
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        user_id: UserId,
        access_token_ref: String,
        refresh_token_ref: String,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
        access_attempts: u64,
        connected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            access_token_ref,
            refresh_token_ref,
            expires_at,
            scopes,
            access_attempts,
            connected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Connection {
        Connection::new(
            UserId::new(),
            "drivemirror/u1/access",
            "drivemirror/u1/refresh",
            Utc::now() + Duration::hours(1),
            vec!["drive.readonly".to_string()],
        )
    }

    #[test]
    fn test_fresh_connection_is_not_expired() {
        let conn = sample();
        assert!(!conn.is_expired());
        assert_eq!(conn.access_attempts(), 0);
    }

    #[test]
    fn test_expires_within_threshold() {
        let conn = sample();
        assert!(!conn.expires_within(Duration::minutes(5)));
        assert!(conn.expires_within(Duration::hours(2)));
    }

    #[test]
    fn test_expired_connection() {
        let mut conn = sample();
        conn.rotate(Utc::now() - Duration::minutes(1), vec![]);
        assert!(conn.is_expired());
    }

    #[test]
    fn test_record_access_increments_counter() {
        let mut conn = sample();
        conn.record_access();
        conn.record_access();
        assert_eq!(conn.access_attempts(), 2);
    }

    #[test]
    fn test_has_scope() {
        let conn = sample();
        assert!(conn.has_scope("drive.readonly"));
        assert!(!conn.has_scope("drive.file"));
    }

    #[test]
    fn test_rotate_keeps_scopes_when_empty() {
        let mut conn = sample();
        let new_expiry = Utc::now() + Duration::hours(2);
        conn.rotate(new_expiry, vec![]);
        assert_eq!(conn.expires_at(), new_expiry);
        assert!(conn.has_scope("drive.readonly"));
    }

    #[test]
    fn test_auth_reason_display() {
        assert_eq!(AuthReason::NoAccessToken.to_string(), "NO_ACCESS_TOKEN");
        assert_eq!(AuthReason::Expired.to_string(), "EXPIRED");
        assert_eq!(AuthReason::ScopeMissing.to_string(), "SCOPE_MISSING");
    }
}
