//! Token manager use case
//!
//! Owns the OAuth grant lifecycle: issuing consent URLs, completing the
//! authorization callback, handing out valid access tokens (refreshing
//! when close to expiry), and disconnecting. Token values only ever live
//! in the credential vault; the state store carries opaque references
//! plus the metadata needed for the expiry decision.
//!
//! Every credential hand-out increments the connection's access counter
//! and appends an audit row. This side channel exists for security
//! review; nothing in the sync path reads it back.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    domain::{
        AuditAction, AuditEntry, AuditResult, AuthReason, Connection, ConnectionStatus,
        SyncError, UserId,
    },
    ports::{ICredentialVault, IDriveProvider, IStateStore, ProviderError, Tokens},
};

/// Refresh the access token when it expires within this window
const REFRESH_THRESHOLD_MINUTES: i64 = 5;

/// Use case for OAuth token lifecycle operations
pub struct TokenManagerUseCase {
    provider: Arc<dyn IDriveProvider>,
    store: Arc<dyn IStateStore>,
    vault: Arc<dyn ICredentialVault>,
    /// Scopes the engine needs; a grant missing any of them is unusable
    required_scopes: Vec<String>,
}

impl TokenManagerUseCase {
    /// Creates a new TokenManagerUseCase with the required dependencies
    pub fn new(
        provider: Arc<dyn IDriveProvider>,
        store: Arc<dyn IStateStore>,
        vault: Arc<dyn ICredentialVault>,
        required_scopes: Vec<String>,
    ) -> Self {
        Self {
            provider,
            store,
            vault,
            required_scopes,
        }
    }

    /// Builds the consent URL the user must visit
    ///
    /// With `force_consent` the provider re-prompts even for an
    /// already-granted app, guaranteeing a fresh refresh token.
    pub async fn authorize(&self, force_consent: bool) -> Result<String, SyncError> {
        let url = self.provider.consent_url(force_consent);

        let entry = AuditEntry::new(AuditAction::AuthorizeUrlIssued, AuditResult::success())
            .with_details(json!({ "force_consent": force_consent }));
        self.save_audit(entry).await;

        Ok(url)
    }

    /// Completes the authorization flow with the callback code
    ///
    /// Exchanges the code for tokens, stores the secrets in the vault and
    /// persists the connection row.
    pub async fn complete_authorization(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<Connection, SyncError> {
        let tokens = self
            .provider
            .exchange_code(code)
            .await
            .map_err(map_provider)?;

        let connection = self.store_grant(user_id, &tokens).await?;

        info!(user_id = %user_id, "authorization completed");
        let entry = AuditEntry::new(AuditAction::AuthConnect, AuditResult::success())
            .with_user_id(user_id)
            .with_details(json!({ "scopes": tokens.scopes }));
        self.save_audit(entry).await;

        Ok(connection)
    }

    /// Reports the connection status together with the configured folder
    pub async fn status(&self, user_id: &UserId) -> Result<ConnectionStatus, SyncError> {
        let connection = self
            .store
            .get_connection(user_id)
            .await
            .map_err(SyncError::storage)?;
        let settings = self
            .store
            .get_settings(user_id)
            .await
            .map_err(SyncError::storage)?;

        let (connected, reason) = match connection {
            None => (false, Some(AuthReason::NoAccessToken)),
            Some(ref conn) if conn.is_expired() => (false, Some(AuthReason::Expired)),
            Some(ref conn) if !self.covers_required_scopes(conn) => {
                (false, Some(AuthReason::ScopeMissing))
            }
            Some(_) => (true, None),
        };

        Ok(ConnectionStatus {
            connected,
            reason,
            dedicated_folder_id: settings.as_ref().map(|s| s.folder_id().clone()),
            dedicated_folder_name: settings.as_ref().map(|s| s.folder_name().to_string()),
            downloads_enabled: settings.map(|s| s.downloads_enabled()).unwrap_or(false),
        })
    }

    /// Hands out a valid access token, refreshing it when close to expiry
    ///
    /// Every call counts as one credential access and is audited.
    pub(crate) async fn valid_access_token(&self, user_id: &UserId) -> Result<String, SyncError> {
        let mut connection = self
            .store
            .get_connection(user_id)
            .await
            .map_err(SyncError::storage)?
            .ok_or(SyncError::AuthRequired(AuthReason::NoAccessToken))?;

        connection.record_access();

        if connection.expires_within(Duration::minutes(REFRESH_THRESHOLD_MINUTES)) {
            debug!(user_id = %user_id, "access token near expiry, refreshing");
            self.refresh_in_place(user_id, &mut connection).await?;
        } else {
            self.store
                .save_connection(&connection)
                .await
                .map_err(SyncError::storage)?;
        }

        let entry = AuditEntry::new(AuditAction::CredentialAccess, AuditResult::success())
            .with_user_id(*user_id)
            .with_details(json!({ "access_attempts": connection.access_attempts() }));
        self.save_audit(entry).await;

        self.vault
            .load(connection.access_token_ref())
            .map_err(SyncError::storage)?
            .ok_or(SyncError::AuthRequired(AuthReason::NoAccessToken))
    }

    /// Disconnects the grant: revokes at the provider, clears the vault
    /// and deletes the connection row
    pub async fn disconnect(&self, user_id: &UserId) -> Result<(), SyncError> {
        let connection = self
            .store
            .get_connection(user_id)
            .await
            .map_err(SyncError::storage)?
            .ok_or(SyncError::AuthRequired(AuthReason::NoAccessToken))?;

        // Revocation is best effort: a dead grant must still be removable
        if let Ok(Some(refresh)) = self.vault.load(connection.refresh_token_ref()) {
            if let Err(err) = self.provider.revoke_token(&refresh).await {
                warn!(user_id = %user_id, error = %err, "token revocation failed");
            }
        }

        self.vault
            .clear(connection.access_token_ref())
            .map_err(SyncError::storage)?;
        self.vault
            .clear(connection.refresh_token_ref())
            .map_err(SyncError::storage)?;
        self.store
            .delete_connection(user_id)
            .await
            .map_err(SyncError::storage)?;

        info!(user_id = %user_id, "disconnected");
        let entry = AuditEntry::new(AuditAction::AuthDisconnect, AuditResult::success())
            .with_user_id(*user_id);
        self.save_audit(entry).await;

        Ok(())
    }

    /// Stores token secrets in the vault and upserts the connection row
    async fn store_grant(
        &self,
        user_id: UserId,
        tokens: &Tokens,
    ) -> Result<Connection, SyncError> {
        let access_ref = format!("drivemirror/{user_id}/access");
        let refresh_ref = format!("drivemirror/{user_id}/refresh");

        self.vault
            .store(&access_ref, &tokens.access_token)
            .map_err(SyncError::storage)?;
        if let Some(ref refresh) = tokens.refresh_token {
            self.vault
                .store(&refresh_ref, refresh)
                .map_err(SyncError::storage)?;
        }

        // Keep the access counter across re-authorizations
        let connection = match self
            .store
            .get_connection(&user_id)
            .await
            .map_err(SyncError::storage)?
        {
            Some(existing) => Connection::from_parts(
                user_id,
                access_ref,
                refresh_ref,
                tokens.expires_at,
                tokens.scopes.clone(),
                existing.access_attempts(),
                existing.connected_at(),
            ),
            None => Connection::new(
                user_id,
                access_ref,
                refresh_ref,
                tokens.expires_at,
                tokens.scopes.clone(),
            ),
        };

        self.store
            .save_connection(&connection)
            .await
            .map_err(SyncError::storage)?;

        Ok(connection)
    }

    /// Refreshes the grant and rotates vault secrets and the connection row
    async fn refresh_in_place(
        &self,
        user_id: &UserId,
        connection: &mut Connection,
    ) -> Result<(), SyncError> {
        let refresh_token = self
            .vault
            .load(connection.refresh_token_ref())
            .map_err(SyncError::storage)?
            .ok_or(SyncError::AuthRequired(AuthReason::NoAccessToken))?;

        let tokens = match self.provider.refresh_tokens(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(err) if err.is_unauthorized() => {
                warn!(user_id = %user_id, "refresh token rejected");
                let entry = AuditEntry::new(
                    AuditAction::TokenRefresh,
                    AuditResult::failed("TOKEN_EXPIRED", err.to_string()),
                )
                .with_user_id(*user_id);
                self.save_audit(entry).await;
                return Err(SyncError::TokenExpired);
            }
            Err(err) => return Err(map_provider(err)),
        };

        self.vault
            .store(connection.access_token_ref(), &tokens.access_token)
            .map_err(SyncError::storage)?;
        if let Some(ref refresh) = tokens.refresh_token {
            self.vault
                .store(connection.refresh_token_ref(), refresh)
                .map_err(SyncError::storage)?;
        }

        connection.rotate(tokens.expires_at, tokens.scopes);
        self.store
            .save_connection(connection)
            .await
            .map_err(SyncError::storage)?;

        let entry = AuditEntry::new(AuditAction::TokenRefresh, AuditResult::success())
            .with_user_id(*user_id);
        self.save_audit(entry).await;

        Ok(())
    }

    /// True when the grant covers every scope the engine requires
    ///
    /// A short grant means the user consented to an older scope set and
    /// must reauthorize with `force_consent`.
    fn covers_required_scopes(&self, connection: &Connection) -> bool {
        self.required_scopes
            .iter()
            .all(|scope| connection.has_scope(scope))
    }

    /// Audit writes never fail the calling operation
    async fn save_audit(&self, entry: AuditEntry) {
        if let Err(err) = self.store.save_audit(&entry).await {
            warn!(error = %err, "failed to record audit entry");
        }
    }
}

/// Maps a provider failure into the sync error taxonomy
pub(crate) fn map_provider(err: ProviderError) -> SyncError {
    match err {
        ProviderError::Unauthorized(_) => SyncError::TokenExpired,
        other => SyncError::Provider(other.to_string()),
    }
}
