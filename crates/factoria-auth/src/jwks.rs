//! Remote JWKS fetching
//!
//! [`JwksFetcher`] downloads a JSON Web Key Set from an authorization server
//! and installs it into a [`JwkStore`]. Call [`load_into`](JwksFetcher::load_into)
//! at startup and [`refresh_into`](JwksFetcher::refresh_into) on a schedule or
//! after a key-id miss.
//!
//! # Security Considerations
//!
//! - HTTPS required for JWKS endpoints (HTTP only for localhost)
//! - 10 second request timeout
//! - Refreshes are rate limited so a flood of unknown `kid`s cannot hammer
//!   the authorization server

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::KeyStoreError;
use crate::jwt::JwkStore;

/// Request timeout for JWKS downloads
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Minimum time between two refreshes
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Errors raised while fetching a JWKS
#[derive(Debug, Error)]
pub enum JwksFetchError {
    /// The endpoint is not a valid URL
    #[error("Invalid JWKS endpoint: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// The endpoint is plain HTTP on a non-local host
    #[error("JWKS endpoint must use HTTPS (HTTP only allowed for localhost): {0}")]
    InsecureUri(String),

    /// Transport failure
    #[error("JWKS fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("JWKS endpoint returned status {0}")]
    Status(http::StatusCode),

    /// Body is not a JWKS document
    #[error("Invalid JWKS format: {0}")]
    InvalidJwks(#[from] serde_json::Error),

    /// The key store rejected the new set
    #[error("Failed to store JWKS: {0}")]
    Store(#[from] KeyStoreError),
}

/// Result of [`JwksFetcher::refresh_into`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh set was stored
    Refreshed {
        /// Keys in the stored set
        key_count: usize,
    },
    /// The previous refresh is too recent; the store was left untouched
    Skipped,
}

/// JWKS downloader
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use factoria_auth::jwks::JwksFetcher;
/// # use factoria_auth::jwt::MemoryJwkStore;
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryJwkStore::new());
/// let fetcher = JwksFetcher::new("https://auth.example.com/.well-known/jwks.json")?;
///
/// fetcher.load_into(store.as_ref()).await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug)]
pub struct JwksFetcher {
    jwks_uri: Url,
    http_client: reqwest::Client,
    min_refresh_interval: Duration,
    last_refresh: Mutex<Option<Instant>>,
}

impl JwksFetcher {
    /// Fetcher with a 10 second timeout and a 5 second minimum refresh interval
    ///
    /// # Errors
    ///
    /// [`JwksFetchError::InvalidUri`] or [`JwksFetchError::InsecureUri`] for a
    /// bad endpoint, [`JwksFetchError::Http`] if the HTTP client cannot be built.
    pub fn new(jwks_uri: impl AsRef<str>) -> Result<Self, JwksFetchError> {
        let http_client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Self::with_client(jwks_uri, http_client)
    }

    /// Fetcher using a caller-supplied HTTP client
    ///
    /// # Errors
    ///
    /// [`JwksFetchError::InvalidUri`] or [`JwksFetchError::InsecureUri`].
    pub fn with_client(
        jwks_uri: impl AsRef<str>,
        http_client: reqwest::Client,
    ) -> Result<Self, JwksFetchError> {
        let jwks_uri = Url::parse(jwks_uri.as_ref())?;
        ensure_secure(&jwks_uri)?;

        Ok(Self {
            jwks_uri,
            http_client,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            last_refresh: Mutex::new(None),
        })
    }

    /// Set the minimum interval between refreshes
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// The JWKS endpoint
    pub fn jwks_uri(&self) -> &str {
        self.jwks_uri.as_str()
    }

    /// Download and parse the key set
    ///
    /// # Errors
    ///
    /// [`JwksFetchError::Http`], [`JwksFetchError::Status`] or
    /// [`JwksFetchError::InvalidJwks`].
    pub async fn fetch(&self) -> Result<JwkSet, JwksFetchError> {
        debug!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let response = self
            .http_client
            .get(self.jwks_uri.clone())
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                JwksFetchError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(jwks_uri = %self.jwks_uri, status = %status, "JWKS endpoint returned error status");
            return Err(JwksFetchError::Status(status));
        }

        let body = response.bytes().await?;
        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            JwksFetchError::InvalidJwks(e)
        })?;

        debug!(jwks_uri = %self.jwks_uri, key_count = jwks.keys.len(), "Fetched JWKS");
        Ok(jwks)
    }

    /// Fetch and store unconditionally, returning the number of keys stored
    ///
    /// # Errors
    ///
    /// Any [`fetch`](Self::fetch) error, or [`JwksFetchError::Store`].
    pub async fn load_into<S>(&self, store: &S) -> Result<usize, JwksFetchError>
    where
        S: JwkStore + ?Sized,
    {
        let mut last_refresh = self.last_refresh.lock().await;
        let key_count = self.fetch_and_store(store).await?;
        *last_refresh = Some(Instant::now());
        Ok(key_count)
    }

    /// Fetch and store unless the previous refresh is too recent
    ///
    /// Concurrent callers are serialized; the ones arriving within the
    /// minimum interval get [`RefreshOutcome::Skipped`].
    ///
    /// # Errors
    ///
    /// Same as [`load_into`](Self::load_into). A failed refresh does not
    /// start the interval.
    pub async fn refresh_into<S>(&self, store: &S) -> Result<RefreshOutcome, JwksFetchError>
    where
        S: JwkStore + ?Sized,
    {
        let mut last_refresh = self.last_refresh.lock().await;

        if let Some(last) = *last_refresh {
            let since_last = last.elapsed();
            if since_last < self.min_refresh_interval {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    since_last_ms = since_last.as_millis(),
                    "JWKS refresh rate limited"
                );
                return Ok(RefreshOutcome::Skipped);
            }
        }

        let key_count = self.fetch_and_store(store).await?;
        *last_refresh = Some(Instant::now());
        Ok(RefreshOutcome::Refreshed { key_count })
    }

    async fn fetch_and_store<S>(&self, store: &S) -> Result<usize, JwksFetchError>
    where
        S: JwkStore + ?Sized,
    {
        let jwks = self.fetch().await?;
        let key_count = jwks.keys.len();
        store.store_jwks(jwks).await?;
        info!(jwks_uri = %self.jwks_uri, key_count, "Installed JWKS");
        Ok(key_count)
    }
}

fn ensure_secure(uri: &Url) -> Result<(), JwksFetchError> {
    let local = matches!(uri.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    match uri.scheme() {
        "https" => Ok(()),
        "http" if local => Ok(()),
        _ => Err(JwksFetchError::InsecureUri(uri.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = JwksFetcher::new("https://auth.example.com/jwks").unwrap();
        assert_eq!(fetcher.jwks_uri(), "https://auth.example.com/jwks");
        assert_eq!(fetcher.min_refresh_interval, DEFAULT_MIN_REFRESH_INTERVAL);
    }

    #[test]
    fn test_custom_refresh_interval() {
        let fetcher = JwksFetcher::new("https://auth.example.com/jwks")
            .unwrap()
            .with_min_refresh_interval(Duration::from_secs(60));
        assert_eq!(fetcher.min_refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_http_only_for_localhost() {
        assert!(JwksFetcher::new("http://localhost:8080/jwks").is_ok());
        assert!(JwksFetcher::new("http://127.0.0.1:8080/jwks").is_ok());
        assert!(matches!(
            JwksFetcher::new("http://auth.example.com/jwks"),
            Err(JwksFetchError::InsecureUri(_))
        ));
        assert!(matches!(
            JwksFetcher::new("ftp://auth.example.com/jwks"),
            Err(JwksFetchError::InsecureUri(_))
        ));
        assert!(matches!(
            JwksFetcher::new("not a url"),
            Err(JwksFetchError::InvalidUri(_))
        ));
    }
}
