//! OAuth2 PKCE authentication flow for the Google Drive API
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for
//! authenticating native desktop applications with Google's OAuth
//! endpoints.
//!
//! ## Components
//!
//! - [`DriveAuthConfig`] - Configuration for the OAuth2 flow
//! - [`OAuthFlow`] - OAuth2 PKCE challenge/exchange logic
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`KeyringVault`] - `ICredentialVault` backed by the system keyring

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    TokenResponse, TokenUrl,
};
use tracing::{debug, info, warn};

use drivemirror_core::ports::drive_provider::{ProviderError, Tokens};
use drivemirror_core::ports::ICredentialVault;

/// Google OAuth2 authorization endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth2 token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google OAuth2 token revocation endpoint
pub(crate) const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Default redirect URI for the local callback server
const REDIRECT_URI: &str = "http://127.0.0.1:8913/callback";

/// Listen address matching the default redirect URI
const CALLBACK_ADDR: &str = "127.0.0.1:8913";

/// Keyring service name for storing token secrets
const KEYRING_SERVICE: &str = "drivemirror";

/// Default OAuth2 scopes: read-only Drive access
const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/drive.readonly"];

// ============================================================================
// DriveAuthConfig
// ============================================================================

/// Configuration for the OAuth2 PKCE authentication flow
#[derive(Debug, Clone)]
pub struct DriveAuthConfig {
    /// OAuth client ID from the Google Cloud console
    pub client_id: String,
    /// Redirect URI for receiving the authorization code
    pub redirect_uri: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
}

impl DriveAuthConfig {
    /// Creates a new DriveAuthConfig with the given client id and defaults
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Creates a config with custom scopes
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Creates a config with a custom redirect URI
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }
}

// ============================================================================
// OAuthFlow
// ============================================================================

/// OAuth2 PKCE flow implementation using the `oauth2` crate
///
/// Handles generating authorization URLs with PKCE challenges,
/// exchanging authorization codes for tokens, and refreshing tokens.
pub struct OAuthFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    scopes: Vec<String>,
}

impl OAuthFlow {
    /// Creates a new OAuthFlow with the given configuration
    pub fn new(config: &DriveAuthConfig) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(AuthUrl::new(AUTH_URL.to_string()).context("Invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(TOKEN_URL.to_string()).context("Invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("Invalid redirect URI")?,
            );

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// Always requests offline access so the code exchange yields a
    /// refresh token. With `force_consent`, Google re-prompts even for an
    /// already-granted app, which guarantees a fresh refresh token.
    ///
    /// # Returns
    /// A tuple of `(authorization_url, csrf_token, pkce_verifier)`.
    /// The `pkce_verifier` must be kept until the code exchange step.
    pub fn generate_auth_url(&self, force_consent: bool) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("access_type", "offline");

        if force_consent {
            auth_request = auth_request.add_extra_param("prompt", "consent");
        }

        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        debug!(force_consent, "Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for OAuth tokens
    ///
    /// # Arguments
    /// * `code` - The authorization code received from the callback
    /// * `pkce_verifier` - The PKCE verifier generated alongside the auth URL
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<Tokens, ProviderError> {
        info!("Exchanging authorization code for tokens");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .map_err(map_token_error)?;

        let tokens = tokens_from_response(&token_result, None);
        info!("Successfully obtained OAuth tokens");
        Ok(tokens)
    }

    /// Refreshes an expired access token using a refresh token
    ///
    /// Google only returns a new refresh token on the original grant;
    /// the previous one is carried forward when the response omits it.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens, ProviderError> {
        info!("Refreshing access token");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await
            .map_err(map_token_error)?;

        let tokens = tokens_from_response(&token_result, Some(refresh_token));
        info!("Successfully refreshed access token");
        Ok(tokens)
    }
}

/// Builds port-level tokens from an oauth2 token response
fn tokens_from_response(
    token_result: &oauth2::basic::BasicTokenResponse,
    previous_refresh_token: Option<&str>,
) -> Tokens {
    let expires_at = token_result
        .expires_in()
        .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::hours(1));

    let scopes = token_result
        .scopes()
        .map(|s| s.iter().map(|scope| scope.to_string()).collect())
        .unwrap_or_default();

    Tokens {
        access_token: token_result.access_token().secret().to_string(),
        refresh_token: token_result
            .refresh_token()
            .map(|t| t.secret().to_string())
            .or_else(|| previous_refresh_token.map(|t| t.to_string())),
        expires_at,
        scopes,
    }
}

/// Maps oauth2 request failures onto port-level provider errors
///
/// A server-side rejection (invalid_grant and friends) means the grant is
/// no longer usable, so it classifies as `Unauthorized`.
fn map_token_error<RE, TE>(err: oauth2::RequestTokenError<RE, TE>) -> ProviderError
where
    RE: std::error::Error,
    TE: oauth2::ErrorResponse,
{
    match err {
        oauth2::RequestTokenError::ServerResponse(resp) => {
            ProviderError::Unauthorized(format!("{:?}", resp))
        }
        oauth2::RequestTokenError::Request(e) => ProviderError::Network(e.to_string()),
        oauth2::RequestTokenError::Parse(e, _) => ProviderError::Decode(e.to_string()),
        oauth2::RequestTokenError::Other(msg) => ProviderError::Network(msg),
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Minimal HTTP server that listens on localhost for the OAuth2 redirect.
///
/// Starts an HTTP server on `127.0.0.1:8913` that waits for the OAuth
/// provider to redirect the user's browser back with an authorization
/// code. Once the code is received, it responds with a success HTML page
/// and shuts down.
pub struct LocalCallbackServer;

/// Parameters extracted from the OAuth2 callback
#[derive(Debug)]
pub struct CallbackParams {
    /// The authorization code
    pub code: String,
    /// The CSRF state parameter
    pub state: String,
}

impl LocalCallbackServer {
    /// Starts the local callback server and waits for the OAuth redirect
    ///
    /// # Returns
    /// The callback parameters (code and state) extracted from the redirect URL
    pub async fn start() -> Result<CallbackParams> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        info!("Starting local OAuth callback server on {}", CALLBACK_ADDR);

        let listener = TcpListener::bind(CALLBACK_ADDR)
            .await
            .with_context(|| format!("Failed to bind callback server to {}", CALLBACK_ADDR))?;

        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let tx = std::sync::Arc::new(tokio::sync::Mutex::new(Some(tx)));

        // Accept a single connection
        let (stream, _addr) = listener
            .accept()
            .await
            .context("Failed to accept connection on callback server")?;

        let io = TokioIo::new(stream);
        let tx_clone = tx.clone();

        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
            let tx_inner = tx_clone.clone();
            async move {
                let uri = req.uri().to_string();
                debug!("Callback server received request: {}", uri);

                let params = parse_callback_params(&uri);

                match params {
                    Some(callback_params) => {
                        if let Some(sender) = tx_inner.lock().await.take() {
                            let _ = sender.send(callback_params);
                        }

                        let html = success_html();
                        Ok::<_, hyper::Error>(
                            Response::builder()
                                .status(StatusCode::OK)
                                .header("Content-Type", "text/html; charset=utf-8")
                                .body(Full::new(Bytes::from(html)))
                                .unwrap(),
                        )
                    }
                    None => {
                        let html = error_html("Missing authorization code in callback");
                        Ok(Response::builder()
                            .status(StatusCode::BAD_REQUEST)
                            .header("Content-Type", "text/html; charset=utf-8")
                            .body(Full::new(Bytes::from(html)))
                            .unwrap())
                    }
                }
            }
        });

        // Serve the single connection
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!("Callback server connection error: {}", e);
            }
        });

        let params = rx
            .await
            .context("Callback server channel closed without receiving parameters")?;

        info!("Received OAuth callback with authorization code");
        Ok(params)
    }
}

/// Opens the user's browser on the consent URL and waits for the redirect
///
/// Combines browser launching with [`LocalCallbackServer`] to provide the
/// complete interactive half of the consent flow.
pub async fn run_interactive_consent(consent_url: &str) -> Result<CallbackParams> {
    info!("Opening browser for authentication");
    webbrowser::open(consent_url).context("Failed to open browser for authentication")?;
    LocalCallbackServer::start().await
}

/// Parses the authorization code and state from a callback URI
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{}", uri)).ok()?;
    let mut code = None;
    let mut state = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            _ => {}
        }
    }

    Some(CallbackParams {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

/// Returns the HTML for a successful authentication page
fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>DriveMirror - Authentication Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Successful</h1>
    <p>You have been authenticated with Google Drive.</p>
    <p>You can close this window and return to DriveMirror.</p>
    <script>setTimeout(function() { window.close(); }, 3000);</script>
</body>
</html>"#
        .to_string()
}

/// Returns the HTML for an authentication error page
fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>DriveMirror - Authentication Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Error</h1>
    <p>{}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#,
        message
    )
}

// ============================================================================
// KeyringVault
// ============================================================================

/// Credential vault backed by the OS keyring
///
/// Implements the `ICredentialVault` port with the `keyring` crate, which
/// stores secrets in the OS credential store (e.g., GNOME Keyring, KDE
/// Wallet). The vault reference produced by the token manager is used as
/// the keyring username under the "drivemirror" service.
pub struct KeyringVault {
    service: String,
}

impl KeyringVault {
    /// Creates a vault against the default keyring service
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    /// Creates a vault against a custom keyring service (testing)
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, reference: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, reference).context("Failed to create keyring entry")
    }
}

impl Default for KeyringVault {
    fn default() -> Self {
        Self::new()
    }
}

impl ICredentialVault for KeyringVault {
    fn store(&self, reference: &str, secret: &str) -> Result<()> {
        self.entry(reference)?
            .set_password(secret)
            .context("Failed to store secret in keyring")?;
        debug!("Stored secret in keyring: {}", reference);
        Ok(())
    }

    fn load(&self, reference: &str) -> Result<Option<String>> {
        match self.entry(reference)?.get_password() {
            Ok(secret) => {
                debug!("Loaded secret from keyring: {}", reference);
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No secret in keyring for: {}", reference);
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn clear(&self, reference: &str) -> Result<()> {
        match self.entry(reference)?.delete_credential() {
            Ok(()) => {
                info!("Cleared secret from keyring: {}", reference);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No secret to clear for: {}", reference);
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}
