//! JWT bearer token authentication
//!
//! # Architecture
//!
//! ```text
//!        Authorization: Bearer <token>
//!                    │
//!   ┌────────────────▼─────────┐      ┌──────────────┐
//!   │ JwtAuthenticationService │─────▶│  JwtVerifier │
//!   └────────────────┬─────────┘      └──────────────┘
//!                    │
//!   ┌────────────────▼─────────┐      ┌──────────────┐
//!   │  JwtBearerTokenDecoder   │─────▶│   JwkStore   │
//!   └────────────────┬─────────┘      └──────────────┘
//!                    │
//!   ┌────────────────▼─────────┐
//!   │        JwtPayload        │
//!   └──────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `claims` - claims normalization into [`JwtPayload`]
//! - `store` - the [`JwkStore`] trait and [`MemoryJwkStore`]
//! - `decoder` - signature and policy checks
//! - `verifier` - post-decode checks
//! - `service` - per-request authentication

pub mod claims;
pub mod decoder;
pub mod service;
pub mod store;
pub mod types;
pub mod verifier;

pub use claims::{
    ClaimsError, JwtPayload, JwtPayloadBuilder, TimestampInput, validate_string_list_field,
    validate_timestamp_field,
};
pub use decoder::{
    JwkStoreTokenDecoder, JwtBearerTokenDecoder, decode_jwt_token_payload,
    kid_from_unverified_header,
};
pub use service::{
    HeaderSource, JwtAuthenticationService, JwtAuthenticator, extract_authorization_header,
    extract_bearer_token,
};
pub use store::{JwkStore, MemoryJwkStore};
pub use types::JwtToken;
pub use verifier::{JwtVerifier, NoneVerifier, RequiredScopesVerifier};
