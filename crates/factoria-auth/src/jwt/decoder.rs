//! JWT bearer token decoding
//!
//! Decoding verifies the signature and the registered claims policy, then
//! hands the raw claims to the payload type for structural validation:
//!
//! 1. Read `alg` and `kid` from the unverified header
//! 2. Reject algorithms outside the configured allow-list
//! 3. Resolve the signing key from a [`JwkStore`]
//! 4. Verify signature, `exp`, `nbf`, `iss`, `aud` and optionally `sub`
//! 5. Build the payload (`JwtPayload` by default)
//!
//! Steps 1, 2 and 4 fail with [`JwtError::InvalidToken`], step 3 with
//! [`JwtError::KeyResolution`] and step 5 with [`JwtError::InvalidPayload`].

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::claims::JwtPayload;
use super::store::JwkStore;
use super::types::JwtToken;
use crate::config::JwtBearerAuthConfig;
use crate::error::{JwtError, JwtResult};

/// Message for signature and claims policy failures
pub const DECODE_FAILED_MESSAGE: &str = "Failed to decode the JWT bearer token payload";
/// Message for a malformed header or a header without `kid`
pub const KID_FAILED_MESSAGE: &str = "Failed to get the kid from the JWT header";
/// Message for structurally invalid claims
pub const PAYLOAD_FAILED_MESSAGE: &str = "Failed to validate the JWT bearer token payload";

/// Verify a token against `key` and the configured policy, returning its raw claims
///
/// `exp` is required; `nbf` is checked when present. Issuer and audience are
/// only checked when the config restricts them. `subject`, when given, must
/// equal the `sub` claim.
///
/// # Errors
///
/// [`JwtError::InvalidToken`] wrapping the `jsonwebtoken` error.
pub fn decode_jwt_token_payload(
    token: &JwtToken,
    key: &DecodingKey,
    config: &JwtBearerAuthConfig,
    subject: Option<&str>,
) -> JwtResult<Map<String, Value>> {
    let header = decode_header(token.as_str()).map_err(|e| {
        debug!(error = %e, "Failed to decode JWT header");
        JwtError::invalid_token_with(DECODE_FAILED_MESSAGE, e)
    })?;

    if !config.is_algorithm_authorized(header.alg) {
        warn!(
            algorithm = ?header.alg,
            allowed = ?config.authorized_algorithms(),
            "JWT algorithm not allowed"
        );
        return Err(JwtError::invalid_token_with(
            DECODE_FAILED_MESSAGE,
            jsonwebtoken::errors::Error::from(ErrorKind::InvalidAlgorithm),
        ));
    }

    let mut validation = Validation::new(header.alg);
    validation.leeway = config.leeway_seconds();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp"]);

    match config.authorized_audiences() {
        Some(audiences) => validation.set_audience(audiences),
        None => validation.validate_aud = false,
    }
    if let Some(issuers) = config.authorized_issuers() {
        validation.set_issuer(issuers);
    }
    if let Some(subject) = subject {
        validation.sub = Some(subject.to_string());
    }

    let data = decode::<Map<String, Value>>(token.as_str(), key, &validation).map_err(|e| {
        warn!(
            error = %e,
            algorithm = ?header.alg,
            issuers = ?config.authorized_issuers(),
            audiences = ?config.authorized_audiences(),
            "JWT validation failed"
        );
        JwtError::invalid_token_with(DECODE_FAILED_MESSAGE, e)
    })?;

    Ok(data.claims)
}

/// Read `kid` from the header without verifying the token
///
/// # Errors
///
/// [`JwtError::InvalidToken`] when the header is malformed or has no `kid`.
pub fn kid_from_unverified_header(token: &JwtToken) -> JwtResult<String> {
    let header = decode_header(token.as_str()).map_err(|e| {
        debug!(error = %e, "Failed to decode JWT header");
        JwtError::invalid_token_with(KID_FAILED_MESSAGE, e)
    })?;

    header.kid.ok_or_else(|| {
        debug!("JWT header has no kid");
        JwtError::invalid_token(KID_FAILED_MESSAGE)
    })
}

/// Turns a bearer token into a verified payload
#[async_trait]
pub trait JwtBearerTokenDecoder: Send + Sync {
    /// Payload produced on success
    type Payload: Send + Sync + 'static;

    /// Verify and decode `token`
    ///
    /// # Errors
    ///
    /// [`JwtError::InvalidToken`], [`JwtError::KeyResolution`] or
    /// [`JwtError::InvalidPayload`].
    async fn decode_payload(&self, token: &JwtToken) -> JwtResult<Self::Payload>;
}

#[async_trait]
impl<D> JwtBearerTokenDecoder for Arc<D>
where
    D: JwtBearerTokenDecoder + ?Sized,
{
    type Payload = D::Payload;

    async fn decode_payload(&self, token: &JwtToken) -> JwtResult<Self::Payload> {
        (**self).decode_payload(token).await
    }
}

/// Decoder resolving signing keys by `kid` from a [`JwkStore`]
///
/// `P` is the payload type built from the verified claims map.
pub struct JwkStoreTokenDecoder<S: ?Sized, P = JwtPayload> {
    store: Arc<S>,
    config: Arc<JwtBearerAuthConfig>,
    subject: Option<String>,
    _payload: PhantomData<fn() -> P>,
}

impl<S: ?Sized, P> std::fmt::Debug for JwkStoreTokenDecoder<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwkStoreTokenDecoder")
            .field("config", &self.config)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl<S: ?Sized, P> Clone for JwkStoreTokenDecoder<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            subject: self.subject.clone(),
            _payload: PhantomData,
        }
    }
}

impl<S: JwkStore + ?Sized> JwkStoreTokenDecoder<S> {
    /// Decoder producing [`JwtPayload`]
    pub fn new(store: Arc<S>, config: JwtBearerAuthConfig) -> Self {
        Self::with_payload(store, config)
    }
}

impl<S: JwkStore + ?Sized, P> JwkStoreTokenDecoder<S, P> {
    /// Decoder producing a custom payload type
    pub fn with_payload(store: Arc<S>, config: JwtBearerAuthConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            subject: None,
            _payload: PhantomData,
        }
    }

    /// Require the `sub` claim to equal `subject`
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// The policy this decoder enforces
    pub fn config(&self) -> &JwtBearerAuthConfig {
        &self.config
    }

    /// The key store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[async_trait]
impl<S, P> JwtBearerTokenDecoder for JwkStoreTokenDecoder<S, P>
where
    S: JwkStore + ?Sized,
    P: TryFrom<Map<String, Value>> + Send + Sync + 'static,
    P::Error: std::error::Error + Send + Sync + 'static,
{
    type Payload = P;

    async fn decode_payload(&self, token: &JwtToken) -> JwtResult<P> {
        let kid = kid_from_unverified_header(token)?;

        let jwk = self.store.get_jwk(&kid).await.map_err(|e| {
            error!(key_id = %kid, error = %e, "Failed to resolve JWT signing key");
            JwtError::from(e)
        })?;

        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            error!(key_id = %kid, error = %e, "Failed to create decoding key from JWK");
            JwtError::invalid_token_with(DECODE_FAILED_MESSAGE, e)
        })?;

        let claims = decode_jwt_token_payload(token, &key, &self.config, self.subject.as_deref())?;

        let payload = P::try_from(claims).map_err(|e| {
            warn!(key_id = %kid, error = %e, "JWT payload validation failed");
            JwtError::invalid_payload_with(PAYLOAD_FAILED_MESSAGE, e)
        })?;

        debug!(key_id = %kid, "JWT bearer token decoded");
        Ok(payload)
    }
}
