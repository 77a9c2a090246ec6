//! Secondary verification after decoding
//!
//! A [`JwtVerifier`] runs once the token is decoded and may reject it for
//! reasons the signature cannot express (revocation, tenant rules, scope
//! requirements). Rejections are [`JwtError::NotVerified`].

use std::sync::Arc;

use async_trait::async_trait;

use super::types::JwtToken;
use crate::error::{JwtError, JwtResult};

/// Secondary check on a decoded token
#[async_trait]
pub trait JwtVerifier<P>: Send + Sync
where
    P: Send + Sync,
{
    /// Accept or reject the decoded token
    ///
    /// # Errors
    ///
    /// [`JwtError::NotVerified`] when the token is rejected.
    async fn verify(&self, token: &JwtToken, payload: &P) -> JwtResult<()>;
}

#[async_trait]
impl<P, V> JwtVerifier<P> for Arc<V>
where
    P: Send + Sync,
    V: JwtVerifier<P> + ?Sized,
{
    async fn verify(&self, token: &JwtToken, payload: &P) -> JwtResult<()> {
        (**self).verify(token, payload).await
    }
}

/// Verifier that accepts every decoded token
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneVerifier;

#[async_trait]
impl<P> JwtVerifier<P> for NoneVerifier
where
    P: Send + Sync,
{
    async fn verify(&self, _token: &JwtToken, _payload: &P) -> JwtResult<()> {
        Ok(())
    }
}

/// Verifier requiring every listed scope to be granted
#[derive(Debug, Clone)]
pub struct RequiredScopesVerifier {
    scopes: Vec<String>,
}

impl RequiredScopesVerifier {
    /// Require all of `scopes` (compared lower-cased)
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            scopes: scopes.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl JwtVerifier<super::JwtPayload> for RequiredScopesVerifier {
    async fn verify(&self, _token: &JwtToken, payload: &super::JwtPayload) -> JwtResult<()> {
        let missing: Vec<&str> = self
            .scopes
            .iter()
            .filter(|scope| !payload.has_scope(scope))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(JwtError::not_verified(format!(
                "Missing required scopes: {}",
                missing.join(", ")
            )))
        }
    }
}
