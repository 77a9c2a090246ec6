//! Tower Layer for JWT bearer authentication

use std::sync::Arc;
use tower::Layer;

use crate::jwt::{JwtAuthenticator, JwtBearerTokenDecoder, JwtVerifier};

use super::service::JwtAuthMiddleware;

/// Tower Layer that authenticates every request before the inner service
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use factoria_auth::tower::JwtAuthLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(JwtAuthLayer::new(authenticator).bypass_path("/health"))
///     .service(my_inner_service);
/// ```
#[derive(Debug, Clone)]
pub struct JwtAuthLayer<D, V> {
    authenticator: JwtAuthenticator<D, V>,
    bypass_paths: Arc<[String]>,
}

impl<D, V> JwtAuthLayer<D, V>
where
    D: JwtBearerTokenDecoder + Clone,
    V: JwtVerifier<D::Payload> + Clone,
{
    /// Layer authenticating every path
    pub fn new(authenticator: JwtAuthenticator<D, V>) -> Self {
        Self {
            authenticator,
            bypass_paths: Arc::from([]),
        }
    }

    /// Forward requests for `path` without authentication
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        let mut paths = self.bypass_paths.to_vec();
        paths.push(path.into());
        self.bypass_paths = paths.into();
        self
    }

    /// The authenticator handing out per-request sessions
    pub fn authenticator(&self) -> &JwtAuthenticator<D, V> {
        &self.authenticator
    }
}

impl<S, D, V> Layer<S> for JwtAuthLayer<D, V>
where
    D: Clone,
    V: Clone,
{
    type Service = JwtAuthMiddleware<S, D, V>;

    fn layer(&self, inner: S) -> Self::Service {
        JwtAuthMiddleware::new(
            inner,
            self.authenticator.clone(),
            Arc::clone(&self.bypass_paths),
        )
    }
}
