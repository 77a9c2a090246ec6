//! Tower Service for JWT bearer authentication
//!
//! Per request, [`JwtAuthMiddleware`]:
//! - skips authentication for configured bypass paths
//! - opens a fresh session from the shared [`JwtAuthenticator`]
//! - authenticates the request head
//! - inserts the verified payload into the request extensions
//! - forwards to the inner service

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::{Request, Response};
use tower_service::Service;
use tracing::trace;

use crate::error::AuthRejection;
use crate::jwt::{JwtAuthenticator, JwtBearerTokenDecoder, JwtVerifier};

/// Tower Service that performs JWT bearer authentication
///
/// # Type Parameters
///
/// * `S` - The inner service type
/// * `D` - The token decoder
/// * `V` - The verifier
#[derive(Debug, Clone)]
pub struct JwtAuthMiddleware<S, D, V> {
    inner: S,
    authenticator: JwtAuthenticator<D, V>,
    bypass_paths: Arc<[String]>,
}

impl<S, D, V> JwtAuthMiddleware<S, D, V> {
    pub(crate) fn new(
        inner: S,
        authenticator: JwtAuthenticator<D, V>,
        bypass_paths: Arc<[String]>,
    ) -> Self {
        Self {
            inner,
            authenticator,
            bypass_paths,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn should_bypass(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
    }
}

/// Boxed future returned by [`JwtAuthMiddleware`]
pub type JwtAuthMiddlewareFuture<T, E> = BoxFuture<'static, Result<T, E>>;

impl<S, D, V, B, ResBody> Service<Request<B>> for JwtAuthMiddleware<S, D, V>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: From<AuthRejection>,
    D: JwtBearerTokenDecoder + Clone + Send + Sync + 'static,
    D::Payload: Clone,
    V: JwtVerifier<D::Payload> + Clone + Send + Sync + 'static,
    B: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = JwtAuthMiddlewareFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if self.should_bypass(req.uri().path()) {
            trace!(path = %req.uri().path(), "Authentication bypassed");
            return Box::pin(async move { inner.call(req).await });
        }

        let mut session = self.authenticator.session();
        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            session.authenticate(&parts).await?;

            if let Some(payload) = session.take_payload() {
                parts.extensions.insert(payload);
            }

            inner.call(Request::from_parts(parts, body)).await
        })
    }
}
