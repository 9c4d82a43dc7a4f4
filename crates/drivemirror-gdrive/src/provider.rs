//! Google Drive implementation of the drive provider port
//!
//! Ties the OAuth flow, HTTP client, and endpoint modules into one
//! `IDriveProvider`. Token lifetime lives in the use-case layer, so every
//! API method takes the access token it should act with.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use oauth2::PkceCodeVerifier;
use tracing::info;

use drivemirror_core::domain::newtypes::{FolderId, PageToken};
use drivemirror_core::ports::drive_provider::{
    ChangeBatch, IDriveProvider, ProviderError, RemoteItem, Tokens,
};

use crate::auth::{DriveAuthConfig, OAuthFlow, REVOKE_URL};
use crate::changes;
use crate::client::DriveClient;
use crate::files;

/// Google Drive adapter implementing `IDriveProvider`
///
/// Holds the OAuth flow for the auth half of the port and a
/// [`DriveClient`] for the API half. The PKCE verifier generated by
/// `consent_url` is kept until the matching `exchange_code` call.
pub struct GoogleDriveProvider {
    flow: OAuthFlow,
    client: DriveClient,
    pending_verifier: Mutex<Option<PkceCodeVerifier>>,
}

impl GoogleDriveProvider {
    /// Creates a provider against the production Google endpoints
    pub fn new(config: &DriveAuthConfig) -> Result<Self> {
        Ok(Self {
            flow: OAuthFlow::new(config)?,
            client: DriveClient::new(),
            pending_verifier: Mutex::new(None),
        })
    }

    /// Creates a provider with a custom API client (useful for testing)
    pub fn with_client(config: &DriveAuthConfig, client: DriveClient) -> Result<Self> {
        Ok(Self {
            flow: OAuthFlow::new(config)?,
            client,
            pending_verifier: Mutex::new(None),
        })
    }
}

#[async_trait]
impl IDriveProvider for GoogleDriveProvider {
    fn consent_url(&self, force_consent: bool) -> String {
        let (url, _csrf, verifier) = self.flow.generate_auth_url(force_consent);
        *self.pending_verifier.lock().unwrap() = Some(verifier);
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<Tokens, ProviderError> {
        let verifier = self.pending_verifier.lock().unwrap().take();
        let verifier = verifier.ok_or_else(|| {
            ProviderError::Unauthorized(
                "no authorization in progress; request a consent URL first".to_string(),
            )
        })?;

        self.flow.exchange_code(code.to_string(), verifier).await
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<Tokens, ProviderError> {
        self.flow.refresh_token(refresh_token).await
    }

    async fn revoke_token(&self, token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .http_client()
            .post(REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        // Google answers 400 for an already-revoked or expired token,
        // which still leaves the grant dead.
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::BAD_REQUEST {
            info!("Token revoked at provider");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Http {
            status: status.as_u16(),
            message: body,
        })
    }

    async fn list_children(
        &self,
        access_token: &str,
        folder_id: &FolderId,
    ) -> Result<Vec<RemoteItem>, ProviderError> {
        files::list_children(&self.client, access_token, folder_id).await
    }

    async fn latest_change_cursor(
        &self,
        access_token: &str,
    ) -> Result<PageToken, ProviderError> {
        changes::latest_cursor(&self.client, access_token).await
    }

    async fn list_changes(
        &self,
        access_token: &str,
        cursor: &PageToken,
    ) -> Result<ChangeBatch, ProviderError> {
        changes::list_changes(&self.client, access_token, cursor).await
    }

    async fn count_changes(
        &self,
        access_token: &str,
        cursor: &PageToken,
    ) -> Result<u64, ProviderError> {
        changes::count_changes(&self.client, access_token, cursor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleDriveProvider {
        GoogleDriveProvider::new(&DriveAuthConfig::new("test-client-id")).unwrap()
    }

    #[test]
    fn test_consent_url_arms_verifier() {
        let provider = provider();
        let url = provider.consent_url(false);
        assert!(url.contains("code_challenge"));
        assert!(provider.pending_verifier.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_exchange_without_pending_verifier_fails() {
        let provider = provider();
        let err = provider.exchange_code("some-code").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_verifier_is_single_use() {
        let provider = provider();
        provider.consent_url(false);
        provider.pending_verifier.lock().unwrap().take();
        let err = provider.exchange_code("some-code").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized(_)));
    }
}
