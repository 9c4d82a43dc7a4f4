//! Google Drive API client
//!
//! Provides a typed HTTP client for the Google Drive v3 API. Handles
//! authentication headers, endpoint construction, 429 backoff, and
//! classification of error responses into the port-level `ProviderError`.
//!
//! The client holds no token itself: every call takes the access token,
//! since token lifetime is owned by the use-case layer.

use std::time::Duration;

use drivemirror_core::ports::drive_provider::ProviderError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Base URL for the Google Drive API v3
const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Default retry-after duration when the header is missing (30 seconds)
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Maximum number of retries for 429 responses
const MAX_RETRIES: u32 = 5;

/// HTTP client for Google Drive API calls
///
/// Wraps `reqwest::Client` with bearer authentication and base URL
/// construction, plus automatic backoff on throttled requests.
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
}

impl DriveClient {
    /// Creates a new DriveClient against the production API
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DRIVE_BASE_URL.to_string(),
        }
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns a reference to the underlying reqwest Client
    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    pub fn request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url).bearer_auth(access_token)
    }

    /// Executes a GET request with automatic 429 backoff
    ///
    /// On HTTP 429 the `Retry-After` header is honored (with a default
    /// when absent), the call sleeps and retries. What escapes as
    /// `ProviderError::RateLimited` has exhausted the retry budget.
    pub async fn get_with_retry(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, ProviderError> {
        let mut last_retry_after = None;

        for attempt in 0..=MAX_RETRIES {
            let response = self
                .request(Method::GET, path, access_token)
                .query(query)
                .send()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                if attempt > 0 {
                    info!(path, attempt, "Request succeeded after retry");
                }
                return Ok(response);
            }

            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            last_retry_after = retry_after_secs;

            if attempt >= MAX_RETRIES {
                warn!(path, attempts = attempt + 1, "429 retry limit exhausted");
                break;
            }

            let backoff = retry_after_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);

            info!(
                path,
                attempt,
                backoff_ms = backoff.as_millis(),
                "Received 429, backing off"
            );
            tokio::time::sleep(backoff).await;
        }

        Err(ProviderError::RateLimited {
            retry_after_secs: last_retry_after,
        })
    }

    /// Classifies a response's status and decodes its JSON body
    ///
    /// Maps the Drive API's failure statuses onto `ProviderError`:
    /// 401 becomes `Unauthorized`, 404 becomes `NotFound`, any other
    /// non-success status becomes `Http`.
    pub async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, ProviderError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unauthorized(body));
        }
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::NotFound(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        debug!(status = %status, "Decoding Drive API response");
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}
