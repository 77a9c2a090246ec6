//! Authentication error taxonomy
//!
//! - [`JwtError`] - failures of one authentication attempt (credentials, token,
//!   payload, verification, key resolution)
//! - [`KeyStoreError`] - failures of a [`JwkStore`](crate::jwt::JwkStore)
//! - [`AuthRejection`] - the HTTP-facing form of a [`JwtError`] (401 or 403 plus
//!   a detail string) handed to the embedding web framework
//!
//! Construction-time errors live next to the types they guard:
//! [`ConfigError`](crate::config::ConfigError) and
//! [`ClaimsError`](crate::jwt::ClaimsError).

use std::borrow::Cow;

use http::StatusCode;
use thiserror::Error;

/// Boxed error used to keep underlying library errors as `source`
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for a single authentication attempt
pub type JwtResult<T> = Result<T, JwtError>;

/// Errors raised while authenticating a bearer token
///
/// Every message-carrying variant has a default message constant. Library
/// errors (`jsonwebtoken`, claims validation, HTTP clients) are preserved as
/// the error `source`.
#[derive(Debug, Error)]
pub enum JwtError {
    /// No `Authorization` header on the request
    #[error("{message}")]
    MissingCredentials {
        /// Human readable message
        message: Cow<'static, str>,
    },

    /// `Authorization` header present but not `Bearer <token>`
    #[error("{message}")]
    InvalidCredentials {
        /// Human readable message
        message: Cow<'static, str>,
    },

    /// Signature or policy failure (algorithm, issuer, audience, expiry, format)
    #[error("{message}")]
    InvalidToken {
        /// Human readable message
        message: Cow<'static, str>,
        /// Underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// Signature verified but the claims are structurally invalid
    #[error("{message}")]
    InvalidPayload {
        /// Human readable message
        message: Cow<'static, str>,
        /// Underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// A secondary verifier rejected the token
    #[error("{message}")]
    NotVerified {
        /// Human readable message
        message: Cow<'static, str>,
        /// Underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// The signing key could not be resolved from the key store
    #[error("Failed to resolve the JWT signing key: {0}")]
    KeyResolution(#[from] KeyStoreError),
}

impl JwtError {
    /// Default message for [`JwtError::MissingCredentials`]
    pub const MISSING_CREDENTIALS: &'static str = "Missing Credentials";
    /// Default message for [`JwtError::InvalidCredentials`]
    pub const INVALID_CREDENTIALS: &'static str = "Invalid Credentials";
    /// Default message for [`JwtError::InvalidToken`]
    pub const INVALID_TOKEN: &'static str = "Invalid JWT";
    /// Default message for [`JwtError::InvalidPayload`]
    pub const INVALID_PAYLOAD: &'static str = "Invalid JWT payload";
    /// Default message for [`JwtError::NotVerified`]
    pub const NOT_VERIFIED: &'static str = "JWT not verified";

    /// Missing credentials with the default message
    pub fn missing_credentials() -> Self {
        Self::MissingCredentials {
            message: Cow::Borrowed(Self::MISSING_CREDENTIALS),
        }
    }

    /// Invalid credentials with the default message
    pub fn invalid_credentials() -> Self {
        Self::InvalidCredentials {
            message: Cow::Borrowed(Self::INVALID_CREDENTIALS),
        }
    }

    /// Invalid token with a custom message and no source
    pub fn invalid_token(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidToken {
            message: message.into(),
            source: None,
        }
    }

    /// Invalid token wrapping an underlying error
    pub fn invalid_token_with(
        message: impl Into<Cow<'static, str>>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::InvalidToken {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Invalid payload wrapping an underlying error
    pub fn invalid_payload_with(
        message: impl Into<Cow<'static, str>>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::InvalidPayload {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Verification failure with a custom message and no source
    pub fn not_verified(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NotVerified {
            message: message.into(),
            source: None,
        }
    }

    /// Verification failure wrapping an underlying error
    pub fn not_verified_with(
        message: impl Into<Cow<'static, str>>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::NotVerified {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// HTTP status this error maps to: 401 for credential problems, 403 otherwise
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredentials { .. } | Self::InvalidCredentials { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::InvalidToken { .. }
            | Self::InvalidPayload { .. }
            | Self::NotVerified { .. }
            | Self::KeyResolution(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Detail string exposed to the client
    pub fn detail(&self) -> String {
        match self {
            Self::MissingCredentials { message } | Self::InvalidCredentials { message } => {
                message.to_string()
            }
            Self::InvalidToken { .. } | Self::KeyResolution(_) => format!("Invalid JWT: {self}"),
            Self::InvalidPayload { .. } => format!("Invalid payload: {self}"),
            Self::NotVerified { .. } => format!("Not verified: {self}"),
        }
    }
}

/// Errors returned by a [`JwkStore`](crate::jwt::JwkStore)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyStoreError {
    /// No key with this id in the current key set
    #[error("Key ID '{kid}' not found in JWKS")]
    KeyNotFound {
        /// The requested key id
        kid: String,
    },

    /// The backing store could not be reached
    #[error("Key store unavailable: {0}")]
    Unavailable(String),
}

/// HTTP-style authentication failure
///
/// Carries the status code (401 or 403) and detail string the embedding web
/// framework turns into a response, plus the [`JwtError`] that caused it.
#[derive(Debug, Error)]
#[error("{status}: {detail}")]
pub struct AuthRejection {
    status: StatusCode,
    detail: String,
    #[source]
    source: JwtError,
}

impl AuthRejection {
    /// HTTP status code (401 or 403)
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Human readable detail
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// The authentication error behind this rejection
    pub fn error(&self) -> &JwtError {
        &self.source
    }

    /// Consume the rejection, returning the authentication error
    pub fn into_error(self) -> JwtError {
        self.source
    }
}

impl From<JwtError> for AuthRejection {
    fn from(source: JwtError) -> Self {
        Self {
            status: source.status_code(),
            detail: source.detail(),
            source,
        }
    }
}
