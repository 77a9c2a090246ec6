//! OAuth 2.0 Token Introspection (RFC 7662)
//!
//! JWT signatures cannot be revoked before `exp`. [`IntrospectionVerifier`]
//! plugs an introspection round-trip into the authentication service as a
//! [`JwtVerifier`], so revoked tokens are rejected with
//! [`JwtError::NotVerified`] even when their signature is valid.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use factoria_auth::introspection::{IntrospectionClient, IntrospectionVerifier};
//! use secrecy::SecretString;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = IntrospectionClient::new(
//!     "https://auth.example.com/oauth/introspect",
//!     "resource-server",
//!     Some(SecretString::new("client-secret".to_string())),
//! )?;
//!
//! let verifier = IntrospectionVerifier::new(Arc::new(client)).with_subject_check(true);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{JwtError, JwtResult};
use crate::jwt::{JwtPayload, JwtToken, JwtVerifier};

/// Request timeout for introspection calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by the introspection client
#[derive(Debug, Error)]
pub enum IntrospectionError {
    /// Transport failure
    #[error("Introspection request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Introspection endpoint returned {status}: {body}")]
    Status {
        /// HTTP status
        status: http::StatusCode,
        /// Response body, possibly empty
        body: String,
    },

    /// Body is not an introspection response
    #[error("Failed to parse introspection response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Token introspection response per RFC 7662 Section 2.2
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active (REQUIRED)
    pub active: bool,

    /// Space-separated scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Token type (Bearer, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration timestamp (seconds since epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Remaining members
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// RFC 7662 introspection client
#[derive(Clone)]
pub struct IntrospectionClient {
    endpoint: String,
    client_id: String,
    client_secret: Option<SecretString>,
    http_client: reqwest::Client,
}

// Manual Debug impl keeps the secret and the client internals out of logs
impl std::fmt::Debug for IntrospectionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionClient")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl IntrospectionClient {
    /// Client for `endpoint`, authenticating as `client_id`
    ///
    /// Pass `None` as secret for public clients.
    ///
    /// # Errors
    ///
    /// [`IntrospectionError::Http`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<SecretString>,
    ) -> Result<Self, IntrospectionError> {
        let http_client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret,
            http_client,
        })
    }

    /// Introspection endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Introspect a token
    ///
    /// # Errors
    ///
    /// [`IntrospectionError::Http`], [`IntrospectionError::Status`] or
    /// [`IntrospectionError::InvalidResponse`].
    pub async fn introspect(
        &self,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<IntrospectionResponse, IntrospectionError> {
        let mut form: Vec<(&str, &str)> = vec![("token", token), ("client_id", &self.client_id)];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }
        if let Some(hint) = token_type_hint {
            form.push(("token_type_hint", hint));
        }

        let response = self.http_client.post(&self.endpoint).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntrospectionError::Status { status, body });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Whether the authorization server still considers the token active
    ///
    /// # Errors
    ///
    /// Same as [`introspect`](Self::introspect).
    pub async fn is_token_active(&self, token: &str) -> Result<bool, IntrospectionError> {
        Ok(self.introspect(token, Some("access_token")).await?.active)
    }
}

/// Verifier rejecting tokens the authorization server reports inactive
#[derive(Debug, Clone)]
pub struct IntrospectionVerifier {
    client: Arc<IntrospectionClient>,
    check_subject: bool,
}

impl IntrospectionVerifier {
    /// Message for inactive tokens
    pub const INACTIVE_MESSAGE: &'static str = "Token is not active";
    /// Message for introspection transport or protocol failures
    pub const FAILED_MESSAGE: &'static str = "Token introspection failed";
    /// Message for a subject mismatch
    pub const SUBJECT_MISMATCH_MESSAGE: &'static str =
        "Introspected subject does not match the token subject";

    /// Verifier using `client`
    pub fn new(client: Arc<IntrospectionClient>) -> Self {
        Self {
            client,
            check_subject: false,
        }
    }

    /// Also require the introspected `sub`, when present, to equal the token's
    pub fn with_subject_check(mut self, check_subject: bool) -> Self {
        self.check_subject = check_subject;
        self
    }
}

#[async_trait]
impl JwtVerifier<JwtPayload> for IntrospectionVerifier {
    async fn verify(&self, token: &JwtToken, payload: &JwtPayload) -> JwtResult<()> {
        let response = self
            .client
            .introspect(token.as_str(), Some("access_token"))
            .await
            .map_err(|e| {
                warn!(endpoint = %self.client.endpoint, error = %e, "Token introspection failed");
                JwtError::not_verified_with(Self::FAILED_MESSAGE, e)
            })?;

        if !response.active {
            debug!(subject = %payload.sub(), "Introspection reports token inactive");
            return Err(JwtError::not_verified(Self::INACTIVE_MESSAGE));
        }

        if self.check_subject
            && let Some(sub) = response.sub.as_deref()
            && sub != payload.sub()
        {
            warn!(subject = %payload.sub(), introspected = %sub, "Introspected subject mismatch");
            return Err(JwtError::not_verified(Self::SUBJECT_MISMATCH_MESSAGE));
        }

        Ok(())
    }
}
