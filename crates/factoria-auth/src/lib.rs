//! # Factoria Auth - JWT Bearer Authentication
//!
//! Bearer-token authentication for Factoria services: token extraction,
//! signature verification against a rotating JWKS, claims normalization and
//! pluggable secondary verification.
//!
//! ## Architecture
//!
//! - [`config`] - Trust policy (algorithms, audiences, issuers, leeway)
//! - [`jwt`] - Claims, key store, token decoder, verifiers and the
//!   authentication service
//! - [`jwks`] - Remote JWKS fetching into a key store
//! - [`introspection`] - RFC 7662 token introspection and its verifier
//! - [`hooks`] - "On error raised" observers
//! - [`error`] - Error taxonomy and HTTP rejections
//! - `tower` - Tower middleware (feature `middleware`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use factoria_auth::{JwtBearerAuthConfig, jwt::{
//!     JwkStore, JwkStoreTokenDecoder, JwtAuthenticationService, MemoryJwkStore, NoneVerifier,
//! }};
//!
//! # tokio_test::block_on(async {
//! let config = JwtBearerAuthConfig::builder("https://api.example.com")
//!     .authorized_issuers(["https://auth.example.com"])
//!     .build()?;
//!
//! let store = Arc::new(MemoryJwkStore::new());
//! // store.store_jwks(jwks).await?;
//!
//! let decoder = Arc::new(JwkStoreTokenDecoder::new(store, config));
//! let mut service = JwtAuthenticationService::new(decoder, Arc::new(NoneVerifier));
//!
//! let mut headers = http::HeaderMap::new();
//! headers.insert(http::header::AUTHORIZATION, "Bearer eyJ...".parse()?);
//!
//! match service.authenticate(&headers).await {
//!     Ok(()) => println!("subject: {}", service.payload().map(|p| p.sub()).unwrap_or("")),
//!     Err(rejection) => println!("{} {}", rejection.status(), rejection.detail()),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` (alias `tower`) - Tower `Layer`/`Service` running one
//!   authentication per request
//!
//! ## Standards
//!
//! - **RFC 7519** - JSON Web Token (JWT)
//! - **RFC 7517** - JSON Web Key (JWK)
//! - **RFC 6750** - Bearer Token Usage
//! - **RFC 7662** - OAuth 2.0 Token Introspection

pub mod config;
pub mod error;
pub mod hooks;
pub mod introspection;
pub mod jwks;
pub mod jwt;

#[cfg(feature = "middleware")]
pub mod tower;

#[cfg(test)]
pub(crate) mod test_utils;

#[doc(inline)]
pub use config::{ConfigError, JwtBearerAuthConfig, JwtBearerAuthConfigBuilder};

#[doc(inline)]
pub use error::{AuthRejection, BoxError, JwtError, JwtResult, KeyStoreError};

#[doc(inline)]
pub use hooks::{AuthErrorHook, TracingErrorHook};

#[doc(inline)]
pub use jwt::{JwtAuthenticationService, JwtPayload, JwtToken};
