//! Bearer token authentication service
//!
//! One [`JwtAuthenticationService`] handles one request:
//!
//! 1. Read the `Authorization` header
//! 2. Parse `Bearer <token>`
//! 3. Decode the token with the injected [`JwtBearerTokenDecoder`]
//! 4. Run the injected [`JwtVerifier`]
//! 5. Expose the payload
//!
//! In raising mode (the default) the first failure is returned as an
//! [`AuthRejection`]. In non-raising mode it is recorded in
//! [`errors`](JwtAuthenticationService::errors) and `authenticate` returns
//! `Ok(())`, leaving the caller to inspect the session.
//!
//! [`JwtAuthenticator`] holds the shared decoder, verifier and hooks and hands
//! out a fresh service per request.

use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName, HeaderValue, Request, request};
use tracing::{debug, warn};

use super::decoder::JwtBearerTokenDecoder;
use super::types::JwtToken;
use super::verifier::JwtVerifier;
use crate::error::{AuthRejection, JwtError, JwtResult};
use crate::hooks::{AuthErrorHook, SharedErrorHook};

/// Scheme prefix of a bearer `Authorization` header (case-sensitive)
pub const BEARER_PREFIX: &str = "Bearer ";

/// Inbound request headers
///
/// Lookups are case-insensitive, as [`HeaderName`] is always lower-case.
pub trait HeaderSource {
    /// Value of the header, if present
    fn header(&self, name: &HeaderName) -> Option<&HeaderValue>;
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.get(name)
    }
}

impl<B> HeaderSource for Request<B> {
    fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers().get(name)
    }
}

impl HeaderSource for request::Parts {
    fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }
}

/// Raw `Authorization` header value
///
/// # Errors
///
/// [`JwtError::MissingCredentials`] when absent or empty and
/// [`JwtError::InvalidCredentials`] when the value is not visible ASCII.
pub fn extract_authorization_header<H>(source: &H) -> JwtResult<&str>
where
    H: HeaderSource + ?Sized,
{
    let value = source
        .header(&AUTHORIZATION)
        .filter(|value| !value.is_empty())
        .ok_or_else(JwtError::missing_credentials)?;

    value.to_str().map_err(|_| {
        debug!("Authorization header is not visible ASCII");
        JwtError::invalid_credentials()
    })
}

/// Token part of `Bearer <token>`
///
/// The prefix is matched exactly. `"Bearer "` alone yields an empty token,
/// which decoding then rejects.
///
/// # Errors
///
/// [`JwtError::InvalidCredentials`] for any other scheme or spelling.
pub fn extract_bearer_token(authorization: &str) -> JwtResult<JwtToken> {
    authorization
        .strip_prefix(BEARER_PREFIX)
        .map(JwtToken::new)
        .ok_or_else(JwtError::invalid_credentials)
}

/// Per-request JWT bearer authentication
pub struct JwtAuthenticationService<D, V>
where
    D: JwtBearerTokenDecoder,
{
    decoder: D,
    verifier: V,
    raise_exception: bool,
    hooks: Vec<SharedErrorHook>,
    payload: Option<D::Payload>,
    errors: Vec<AuthRejection>,
}

impl<D, V> std::fmt::Debug for JwtAuthenticationService<D, V>
where
    D: JwtBearerTokenDecoder,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticationService")
            .field("raise_exception", &self.raise_exception)
            .field("hooks", &self.hooks.len())
            .field("authenticated", &self.payload.is_some())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<D, V> JwtAuthenticationService<D, V>
where
    D: JwtBearerTokenDecoder,
    V: JwtVerifier<D::Payload>,
{
    /// Service in raising mode with no hooks
    pub fn new(decoder: D, verifier: V) -> Self {
        Self {
            decoder,
            verifier,
            raise_exception: true,
            hooks: Vec::new(),
            payload: None,
            errors: Vec::new(),
        }
    }

    /// Return failures (`true`, default) or record them (`false`)
    pub fn with_raise_exception(mut self, raise_exception: bool) -> Self {
        self.raise_exception = raise_exception;
        self
    }

    /// Register an error hook
    pub fn with_hook(mut self, hook: impl AuthErrorHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Register already shared error hooks
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = SharedErrorHook>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Authenticate the request
    ///
    /// On success the payload is available through [`payload`](Self::payload).
    ///
    /// # Errors
    ///
    /// In raising mode, the [`AuthRejection`] for the first failure (401 for
    /// missing or malformed credentials, 403 otherwise). Never fails in
    /// non-raising mode.
    pub async fn authenticate<H>(&mut self, request: &H) -> Result<(), AuthRejection>
    where
        H: HeaderSource + ?Sized,
    {
        self.payload = None;

        match self.run(request).await {
            Ok(payload) => {
                debug!("JWT bearer authentication succeeded");
                self.payload = Some(payload);
                Ok(())
            }
            Err(err) => self.reject(err),
        }
    }

    async fn run<H>(&self, request: &H) -> JwtResult<D::Payload>
    where
        H: HeaderSource + ?Sized,
    {
        let token = extract_bearer_token(extract_authorization_header(request)?)?;
        let payload = self.decoder.decode_payload(&token).await?;
        self.verifier.verify(&token, &payload).await?;
        Ok(payload)
    }

    fn reject(&mut self, err: JwtError) -> Result<(), AuthRejection> {
        let rejection = AuthRejection::from(err);
        warn!(
            status = %rejection.status(),
            detail = %rejection.detail(),
            raise = self.raise_exception,
            "JWT bearer authentication failed"
        );

        for hook in &self.hooks {
            hook.on_error(&rejection);
        }

        if self.raise_exception {
            Err(rejection)
        } else {
            self.errors.push(rejection);
            Ok(())
        }
    }

    /// Verified payload after a successful [`authenticate`](Self::authenticate)
    pub fn payload(&self) -> Option<&D::Payload> {
        self.payload.as_ref()
    }

    /// Take the verified payload out of the session
    pub fn take_payload(&mut self) -> Option<D::Payload> {
        self.payload.take()
    }

    /// Consume the session, returning the verified payload
    pub fn into_payload(self) -> Option<D::Payload> {
        self.payload
    }

    /// Recorded rejections (non-raising mode)
    pub fn errors(&self) -> &[AuthRejection] {
        &self.errors
    }

    /// Whether any rejection was recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether failures are returned rather than recorded
    pub fn raise_exception(&self) -> bool {
        self.raise_exception
    }
}

/// Shared authentication setup producing one service per request
pub struct JwtAuthenticator<D, V> {
    decoder: D,
    verifier: V,
    raise_exception: bool,
    hooks: Vec<SharedErrorHook>,
}

impl<D, V> Clone for JwtAuthenticator<D, V>
where
    D: Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            decoder: self.decoder.clone(),
            verifier: self.verifier.clone(),
            raise_exception: self.raise_exception,
            hooks: self.hooks.clone(),
        }
    }
}

impl<D, V> std::fmt::Debug for JwtAuthenticator<D, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("raise_exception", &self.raise_exception)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

impl<D, V> JwtAuthenticator<D, V>
where
    D: JwtBearerTokenDecoder + Clone,
    V: JwtVerifier<D::Payload> + Clone,
{
    /// Authenticator in raising mode with no hooks
    pub fn new(decoder: D, verifier: V) -> Self {
        Self {
            decoder,
            verifier,
            raise_exception: true,
            hooks: Vec::new(),
        }
    }

    /// Mode for the sessions this authenticator creates
    pub fn with_raise_exception(mut self, raise_exception: bool) -> Self {
        self.raise_exception = raise_exception;
        self
    }

    /// Register an error hook on every session
    pub fn with_hook(mut self, hook: impl AuthErrorHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Fresh per-request service
    pub fn session(&self) -> JwtAuthenticationService<D, V> {
        JwtAuthenticationService::new(self.decoder.clone(), self.verifier.clone())
            .with_raise_exception(self.raise_exception)
            .with_hooks(self.hooks.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{JwtPayload, NoneVerifier};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use http::StatusCode;
    use std::sync::Mutex;

    fn payload() -> JwtPayload {
        let now = Utc::now();
        JwtPayload::builder()
            .scope("read")
            .aud("api1")
            .iss("https://auth.example.com")
            .exp(now + Duration::hours(1))
            .iat(now)
            .nbf(now)
            .sub("user123")
            .build()
            .unwrap()
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Payload,
        InvalidToken,
        InvalidPayload,
    }

    /// Decoder returning a fixed outcome and recording the tokens it saw
    #[derive(Clone)]
    struct StubDecoder {
        outcome: Outcome,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl StubDecoder {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl JwtBearerTokenDecoder for StubDecoder {
        type Payload = JwtPayload;

        async fn decode_payload(&self, token: &JwtToken) -> JwtResult<JwtPayload> {
            self.seen.lock().unwrap().push(token.to_string());
            match self.outcome {
                Outcome::Payload => Ok(payload()),
                Outcome::InvalidToken => Err(JwtError::invalid_token("Signature verification failed")),
                Outcome::InvalidPayload => Err(JwtError::invalid_payload_with(
                    "Failed to validate the JWT bearer token payload",
                    std::io::Error::other("missing sub"),
                )),
            }
        }
    }

    /// Verifier rejecting everything and recording what it saw
    #[derive(Clone, Default)]
    struct RejectingVerifier {
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl JwtVerifier<JwtPayload> for RejectingVerifier {
        async fn verify(&self, token: &JwtToken, payload: &JwtPayload) -> JwtResult<()> {
            self.seen
                .lock()
                .unwrap()
                .push((token.to_string(), payload.sub().to_string()));
            Err(JwtError::not_verified("Token revoked"))
        }
    }

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_authorization_header() {
        let headers = bearer("Bearer test.token.here");
        assert_eq!(extract_authorization_header(&headers).unwrap(), "Bearer test.token.here");

        let request = Request::builder()
            .header("authorization", "Bearer abc")
            .body(())
            .unwrap();
        assert_eq!(extract_authorization_header(&request).unwrap(), "Bearer abc");

        let (parts, ()) = request.into_parts();
        assert_eq!(extract_authorization_header(&parts).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_extract_authorization_header_missing() {
        let err = extract_authorization_header(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, JwtError::MissingCredentials { .. }));
        assert_eq!(err.to_string(), "Missing Credentials");

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(""));
        let err = extract_authorization_header(&headers).unwrap_err();
        assert!(matches!(err, JwtError::MissingCredentials { .. }));
        assert_eq!(err.to_string(), "Missing Credentials");
    }

    #[test]
    fn test_extract_authorization_header_opaque_bytes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap());
        let err = extract_authorization_header(&headers).unwrap_err();
        assert!(matches!(err, JwtError::InvalidCredentials { .. }));
    }

    #[test]
    fn test_extract_bearer_token() {
        let token = extract_bearer_token("Bearer test.token.here").unwrap();
        assert_eq!(token, JwtToken::new("test.token.here"));

        let empty = extract_bearer_token("Bearer ").unwrap();
        assert!(empty.is_empty());

        for header in ["Basic test.token.here", "Bearertest.token.here", "bearer abc", "Bearer"] {
            let err = extract_bearer_token(header).unwrap_err();
            assert!(matches!(err, JwtError::InvalidCredentials { .. }), "{header}");
            assert_eq!(err.to_string(), "Invalid Credentials");
        }
    }

    #[tokio::test]
    async fn test_initial_state() {
        let service = JwtAuthenticationService::new(StubDecoder::new(Outcome::Payload), NoneVerifier);
        assert!(service.raise_exception());
        assert!(!service.has_errors());
        assert!(service.payload().is_none());
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let decoder = StubDecoder::new(Outcome::Payload);
        let seen = Arc::clone(&decoder.seen);
        let mut service = JwtAuthenticationService::new(decoder, NoneVerifier);

        service.authenticate(&bearer("Bearer test.token.here")).await.unwrap();

        assert_eq!(service.payload().map(JwtPayload::sub), Some("user123"));
        assert!(!service.has_errors());
        assert_eq!(*seen.lock().unwrap(), vec!["test.token.here".to_string()]);
        assert_eq!(service.into_payload().unwrap().sub(), "user123");
    }

    #[tokio::test]
    async fn test_failures_in_raising_mode() {
        let cases = [
            (HeaderMap::new(), Outcome::Payload, StatusCode::UNAUTHORIZED, "Missing Credentials"),
            (bearer("Basic abc"), Outcome::Payload, StatusCode::UNAUTHORIZED, "Invalid Credentials"),
            (bearer("Bearer abc"), Outcome::InvalidToken, StatusCode::FORBIDDEN, "Invalid JWT"),
            (bearer("Bearer abc"), Outcome::InvalidPayload, StatusCode::FORBIDDEN, "Invalid payload"),
        ];

        for (headers, outcome, status, detail) in cases {
            let mut service = JwtAuthenticationService::new(StubDecoder::new(outcome), NoneVerifier);
            let rejection = service.authenticate(&headers).await.unwrap_err();

            assert_eq!(rejection.status(), status);
            assert!(rejection.detail().contains(detail), "{}", rejection.detail());
            assert!(service.payload().is_none());
            assert!(!service.has_errors());
        }
    }

    #[tokio::test]
    async fn test_failures_in_recording_mode() {
        let cases = [
            (HeaderMap::new(), Outcome::Payload, StatusCode::UNAUTHORIZED, "Missing Credentials"),
            (bearer("Bearertoken"), Outcome::Payload, StatusCode::UNAUTHORIZED, "Invalid Credentials"),
            (bearer("Bearer abc"), Outcome::InvalidToken, StatusCode::FORBIDDEN, "Invalid JWT"),
            (bearer("Bearer abc"), Outcome::InvalidPayload, StatusCode::FORBIDDEN, "Invalid payload"),
        ];

        for (headers, outcome, status, detail) in cases {
            let mut service = JwtAuthenticationService::new(StubDecoder::new(outcome), NoneVerifier)
                .with_raise_exception(false);
            service.authenticate(&headers).await.unwrap();

            assert!(service.has_errors());
            assert_eq!(service.errors().len(), 1);
            assert_eq!(service.errors()[0].status(), status);
            assert!(service.errors()[0].detail().contains(detail));
            assert!(service.payload().is_none());
        }
    }

    #[tokio::test]
    async fn test_verifier_rejection() {
        let verifier = RejectingVerifier::default();
        let seen = Arc::clone(&verifier.seen);
        let mut service = JwtAuthenticationService::new(StubDecoder::new(Outcome::Payload), verifier);

        let rejection = service.authenticate(&bearer("Bearer test.token.here")).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
        assert_eq!(rejection.detail(), "Not verified: Token revoked");
        assert!(service.payload().is_none());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("test.token.here".to_string(), "user123".to_string())]
        );
    }

    #[tokio::test]
    async fn test_decoder_failure_skips_verifier() {
        let verifier = RejectingVerifier::default();
        let seen = Arc::clone(&verifier.seen);
        let mut service = JwtAuthenticationService::new(StubDecoder::new(Outcome::InvalidToken), verifier)
            .with_raise_exception(false);

        service.authenticate(&bearer("Bearer abc")).await.unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert!(service.errors()[0].detail().starts_with("Invalid JWT"));
    }

    #[tokio::test]
    async fn test_hooks_fire_in_both_modes() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        for raise in [true, false] {
            let sink = Arc::clone(&calls);
            let mut service = JwtAuthenticationService::new(StubDecoder::new(Outcome::Payload), NoneVerifier)
                .with_raise_exception(raise)
                .with_hook(move |rejection: &AuthRejection| {
                    sink.lock().unwrap().push(rejection.status());
                });
            let _ = service.authenticate(&HeaderMap::new()).await;
        }

        assert_eq!(
            *calls.lock().unwrap(),
            vec![StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED]
        );
    }

    #[tokio::test]
    async fn test_authenticator_sessions_are_independent() {
        let authenticator =
            JwtAuthenticator::new(StubDecoder::new(Outcome::Payload), NoneVerifier).with_raise_exception(false);

        let mut failed = authenticator.session();
        failed.authenticate(&HeaderMap::new()).await.unwrap();
        assert!(failed.has_errors());

        let mut ok = authenticator.session();
        ok.authenticate(&bearer("Bearer abc")).await.unwrap();
        assert!(!ok.has_errors());
        assert!(ok.payload().is_some());
        assert!(!ok.raise_exception());
    }
}
