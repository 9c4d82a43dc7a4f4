//! Drive provider port (driven/secondary port)
//!
//! Interface for the remote drive API. The primary implementation targets
//! the Google Drive v3 API, but the trait is provider-agnostic: the use
//! cases only see opaque folder ids, item ids and change cursors.
//!
//! ## Design Notes
//!
//! - Returns a typed `ProviderError` rather than `anyhow::Error`: the
//!   orchestrator's retry policy needs to distinguish auth failures
//!   (stop, user action) from transient ones, so classification must
//!   survive the port boundary.
//! - `RemoteItem` and `ChangeRecord` are port-level DTOs, not domain
//!   entities; use cases map them to `MirrorItem` rows.
//! - Pagination of children listings is an adapter concern:
//!   `list_children` drains every page before returning, so a caller
//!   never observes a partially listed folder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::{FolderId, PageToken};

// ============================================================================
// Provider errors
// ============================================================================

/// Errors surfaced by drive provider adapters
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The access token was rejected (HTTP 401)
    #[error("provider rejected credentials: {0}")]
    Unauthorized(String),

    /// The provider throttled the request (HTTP 429)
    #[error("provider rate limited, retry after {retry_after_secs:?}s")]
    RateLimited {
        /// Retry-After hint, when the provider sent one
        retry_after_secs: Option<u64>,
    },

    /// The requested folder or item does not exist (HTTP 404)
    #[error("remote resource not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP response
    #[error("provider returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Transport-level failure (DNS, TLS, timeouts)
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("malformed provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// True if the failure indicates the access token must be refreshed
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ProviderError::Unauthorized(_))
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens received from the provider's token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Scopes actually granted by the user
    pub scopes: Vec<String>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// ============================================================================
// Listing and change DTOs
// ============================================================================

/// Video metadata reported by the provider for media items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Frame width in pixels
    pub width: Option<u32>,
    /// Frame height in pixels
    pub height: Option<u32>,
    /// Playback duration in milliseconds
    pub duration_ms: Option<u64>,
}

/// One entry of a children listing or a change record payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Provider-specific item identifier
    pub id: String,
    /// Item display name
    pub name: String,
    /// MIME type reported by the provider
    pub mime_type: String,
    /// First parent folder id, when reported
    pub parent_id: Option<String>,
    /// True when the item is a folder
    pub is_folder: bool,
    /// Short-lived thumbnail URL
    pub thumbnail_link: Option<String>,
    /// Browser link for opening the item
    pub web_view_link: Option<String>,
    /// Whether the item sits in the provider's trash
    pub trashed: bool,
    /// Video metadata, for media items that carry it
    pub video: Option<VideoInfo>,
    /// Last modified timestamp, when reported
    pub modified: Option<DateTime<Utc>>,
}

/// One record from the changes feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// The item the change applies to
    pub item_id: String,
    /// True when the item was removed (permanently or out of scope);
    /// `item` is absent in that case
    pub removed: bool,
    /// Current item metadata, when the item still exists
    pub item: Option<RemoteItem>,
}

/// Response from one drain of the changes feed
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeBatch {
    /// All change records since the supplied cursor, in feed order
    pub changes: Vec<ChangeRecord>,
    /// Cursor for the next pull
    pub new_cursor: PageToken,
}

// ============================================================================
// IDriveProvider trait
// ============================================================================

/// Port trait for remote drive operations
///
/// ## Implementation Notes
///
/// - `list_children` and `list_changes` drain provider-side pagination
///   internally and return complete results.
/// - Transient throttling should be retried by the adapter; what escapes
///   as `RateLimited` has exhausted the adapter's own retry budget.
#[async_trait::async_trait]
pub trait IDriveProvider: Send + Sync {
    /// Builds the consent URL the user must visit to grant access
    ///
    /// When `force_consent` is set, the provider is asked to re-prompt
    /// even for an already-granted app, which guarantees a fresh refresh
    /// token in the subsequent code exchange.
    fn consent_url(&self, force_consent: bool) -> String;

    /// Exchanges an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<Tokens, ProviderError>;

    /// Refreshes an expired access token
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<Tokens, ProviderError>;

    /// Revokes a token at the provider, ending the grant
    async fn revoke_token(&self, token: &str) -> Result<(), ProviderError>;

    /// Lists the complete immediate children of a folder
    async fn list_children(
        &self,
        access_token: &str,
        folder_id: &FolderId,
    ) -> Result<Vec<RemoteItem>, ProviderError>;

    /// Fetches the current head cursor of the changes feed
    ///
    /// A pull starting from this cursor returns only changes made after
    /// this call.
    async fn latest_change_cursor(&self, access_token: &str)
        -> Result<PageToken, ProviderError>;

    /// Drains the changes feed from the given cursor
    async fn list_changes(
        &self,
        access_token: &str,
        cursor: &PageToken,
    ) -> Result<ChangeBatch, ProviderError>;

    /// Counts pending changes without consuming the cursor
    async fn count_changes(
        &self,
        access_token: &str,
        cursor: &PageToken,
    ) -> Result<u64, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_classification() {
        assert!(ProviderError::Unauthorized("expired".into()).is_unauthorized());
        assert!(!ProviderError::RateLimited {
            retry_after_secs: Some(3)
        }
        .is_unauthorized());
    }

    #[test]
    fn test_tokens_expiry() {
        let live = Tokens {
            access_token: "at".into(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            scopes: vec![],
        };
        assert!(!live.is_expired());

        let dead = Tokens {
            expires_at: Utc::now() - chrono::Duration::minutes(1),
            ..live
        };
        assert!(dead.is_expired());
    }
}
