//! Bearer token newtype

use std::fmt;

/// Raw JWT bearer token (the `<token>` of `Authorization: Bearer <token>`)
///
/// `Debug` never prints the token. `Display` and [`as_str`](Self::as_str) give
/// the raw value for decoding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JwtToken(String);

impl JwtToken {
    /// Wrap a raw token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unwrap into the raw token string
    pub fn into_inner(self) -> String {
        self.0
    }
}

// Manual Debug impl to keep bearer tokens out of logs
impl fmt::Debug for JwtToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JwtToken")
            .field(&format_args!("<redacted {} bytes>", self.0.len()))
            .finish()
    }
}

impl fmt::Display for JwtToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JwtToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for JwtToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for JwtToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}
