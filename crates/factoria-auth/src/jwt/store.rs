//! JWKS key store
//!
//! A [`JwkStore`] holds the current JSON Web Key Set and resolves signing keys
//! by key id. Rotation replaces the whole set at once with
//! [`store_jwks`](JwkStore::store_jwks); readers see either the old or the new
//! set, never a mix.
//!
//! [`MemoryJwkStore`] is the in-process implementation. It serializes every
//! read and write through one [`tokio::sync::Mutex`] and hands out the stored
//! set as a shared [`Arc`], so reads never copy keys.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::KeyStoreError;

/// Result type for key store operations
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

/// Source of signing keys
///
/// Implementations only provide [`get_jwks`](Self::get_jwks) and
/// [`store_jwks`](Self::store_jwks); key lookup is built on top.
#[async_trait]
pub trait JwkStore: Send + Sync {
    /// Current key set
    ///
    /// # Errors
    ///
    /// [`KeyStoreError::Unavailable`] when the backend cannot be reached.
    async fn get_jwks(&self) -> KeyStoreResult<Arc<JwkSet>>;

    /// Replace the stored key set
    ///
    /// # Errors
    ///
    /// [`KeyStoreError::Unavailable`] when the backend cannot be reached.
    async fn store_jwks(&self, jwks: JwkSet) -> KeyStoreResult<()>;

    /// Key with the given key id
    ///
    /// # Errors
    ///
    /// [`KeyStoreError::KeyNotFound`] when no key in the current set has `kid`.
    async fn get_jwk(&self, kid: &str) -> KeyStoreResult<Jwk> {
        let jwks = self.get_jwks().await?;
        jwks.find(kid).cloned().ok_or_else(|| KeyStoreError::KeyNotFound {
            kid: kid.to_string(),
        })
    }
}

#[async_trait]
impl<S> JwkStore for Arc<S>
where
    S: JwkStore + ?Sized,
{
    async fn get_jwks(&self) -> KeyStoreResult<Arc<JwkSet>> {
        (**self).get_jwks().await
    }

    async fn store_jwks(&self, jwks: JwkSet) -> KeyStoreResult<()> {
        (**self).store_jwks(jwks).await
    }

    async fn get_jwk(&self, kid: &str) -> KeyStoreResult<Jwk> {
        (**self).get_jwk(kid).await
    }
}

/// In-memory key store
///
/// Starts empty. Repeated [`get_jwks`](JwkStore::get_jwks) calls return the
/// same `Arc` until the next [`store_jwks`](JwkStore::store_jwks).
#[derive(Debug)]
pub struct MemoryJwkStore {
    jwks: Mutex<Arc<JwkSet>>,
}

impl MemoryJwkStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_jwks(JwkSet { keys: Vec::new() })
    }

    /// Create a store holding `jwks`
    pub fn with_jwks(jwks: JwkSet) -> Self {
        Self {
            jwks: Mutex::new(Arc::new(jwks)),
        }
    }
}

impl Default for MemoryJwkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JwkStore for MemoryJwkStore {
    async fn get_jwks(&self) -> KeyStoreResult<Arc<JwkSet>> {
        let jwks = self.jwks.lock().await;
        Ok(Arc::clone(&jwks))
    }

    async fn store_jwks(&self, jwks: JwkSet) -> KeyStoreResult<()> {
        let key_count = jwks.keys.len();
        let mut current = self.jwks.lock().await;
        *current = Arc::new(jwks);
        info!(key_count, "Stored JWKS");
        Ok(())
    }

    async fn get_jwk(&self, kid: &str) -> KeyStoreResult<Jwk> {
        let jwks = self.jwks.lock().await;
        match jwks.find(kid) {
            Some(jwk) => Ok(jwk.clone()),
            None => {
                debug!(key_id = kid, key_count = jwks.keys.len(), "Key ID not found in JWKS");
                Err(KeyStoreError::KeyNotFound {
                    kid: kid.to_string(),
                })
            }
        }
    }
}
