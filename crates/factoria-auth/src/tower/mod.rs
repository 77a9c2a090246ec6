//! # Tower Middleware
//!
//! [`JwtAuthLayer`] wraps an HTTP service with one
//! [`JwtAuthenticationService`](crate::jwt::JwtAuthenticationService) session
//! per request.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use factoria_auth::jwt::JwtAuthenticator;
//! use factoria_auth::tower::JwtAuthLayer;
//!
//! let authenticator = JwtAuthenticator::new(decoder, verifier);
//!
//! let service = ServiceBuilder::new()
//!     .layer(JwtAuthLayer::new(authenticator).bypass_path("/health"))
//!     .service(my_http_handler);
//! ```
//!
//! ## Request Extensions
//!
//! On success the verified payload is inserted into the request's extensions:
//!
//! ```rust,ignore
//! if let Some(payload) = req.extensions().get::<JwtPayload>() {
//!     println!("Authenticated subject: {}", payload.sub());
//! }
//! ```
//!
//! A raising authenticator turns failures into the inner service's error type
//! through `From<AuthRejection>`. A non-raising one forwards the request
//! without a payload.

mod layer;
mod service;

pub use layer::JwtAuthLayer;
pub use service::{JwtAuthMiddleware, JwtAuthMiddlewareFuture};
