//! Common test utilities for integration tests
//!
//! Fixed signing keys, token builders and a mock authorization server
//! serving JWKS and introspection responses.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use factoria_auth::JwtBearerAuthConfig;
use factoria_auth::jwt::{
    JwkStoreTokenDecoder, JwtAuthenticationService, MemoryJwkStore, NoneVerifier,
};
use http::HeaderMap;
use http::header::AUTHORIZATION;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const PRIMARY_KID: &str = "primary";
pub const ROTATED_KID: &str = "rotated";
pub const EDWARDS_KID: &str = "edwards";
pub const ISSUER: &str = "https://auth.example.com";
pub const AUDIENCE: &str = "aud1";

pub const RSA_PRIMARY_PEM: &str = include_str!("../fixtures/rsa_primary.pem");
pub const RSA_ROTATED_PEM: &str = include_str!("../fixtures/rsa_rotated.pem");
pub const ED25519_PEM: &str = include_str!("../fixtures/ed25519.pem");
pub const JWKS_JSON: &str = include_str!("../fixtures/jwks.json");
pub const JWKS_ROTATED_JSON: &str = include_str!("../fixtures/jwks_rotated.json");

pub type TestDecoder = Arc<JwkStoreTokenDecoder<MemoryJwkStore>>;
pub type TestService = JwtAuthenticationService<TestDecoder, Arc<NoneVerifier>>;

/// Route `tracing` output to the test harness (`RUST_LOG` filters it)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Primary RSA key plus the Ed25519 key
pub fn primary_jwks() -> JwkSet {
    serde_json::from_str(JWKS_JSON).expect("fixture JWKS")
}

/// Rotated RSA key only
pub fn rotated_jwks() -> JwkSet {
    serde_json::from_str(JWKS_ROTATED_JSON).expect("fixture JWKS")
}

/// Claims valid for an hour, issued by [`ISSUER`] for `audience`
pub fn claims_for(audience: &str) -> Map<String, Value> {
    let now = Utc::now().timestamp();
    match json!({
        "scope": "read write",
        "aud": audience,
        "iss": ISSUER,
        "exp": now + 3600,
        "iat": now,
        "nbf": now - 60,
        "sub": "user123",
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn valid_claims() -> Map<String, Value> {
    claims_for(AUDIENCE)
}

pub fn sign_with(claims: &Map<String, Value>, alg: Algorithm, kid: &str, key: &EncodingKey) -> String {
    let mut header = Header::new(alg);
    header.kid = Some(kid.to_string());
    encode(&header, claims, key).expect("sign token")
}

pub fn sign_primary(claims: &Map<String, Value>) -> String {
    let key = EncodingKey::from_rsa_pem(RSA_PRIMARY_PEM.as_bytes()).expect("RSA key");
    sign_with(claims, Algorithm::RS256, PRIMARY_KID, &key)
}

pub fn sign_rotated(claims: &Map<String, Value>) -> String {
    let key = EncodingKey::from_rsa_pem(RSA_ROTATED_PEM.as_bytes()).expect("RSA key");
    sign_with(claims, Algorithm::RS256, ROTATED_KID, &key)
}

pub fn sign_edwards(claims: &Map<String, Value>) -> String {
    let key = EncodingKey::from_ed_pem(ED25519_PEM.as_bytes()).expect("Ed25519 key");
    sign_with(claims, Algorithm::EdDSA, EDWARDS_KID, &key)
}

/// Headers carrying `Authorization: <value>`
pub fn authorization(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value.parse().expect("header value"));
    headers
}

pub fn bearer(token: &str) -> HeaderMap {
    authorization(&format!("Bearer {token}"))
}

/// Config restricted to [`AUDIENCE`] and [`ISSUER`]
pub fn test_config() -> JwtBearerAuthConfig {
    JwtBearerAuthConfig::builder(AUDIENCE)
        .authorized_audiences([AUDIENCE])
        .authorized_issuers([ISSUER])
        .build()
        .expect("valid config")
}

/// Decoder over a store holding `jwks`
pub fn decoder_with(jwks: JwkSet, config: JwtBearerAuthConfig) -> TestDecoder {
    Arc::new(JwkStoreTokenDecoder::new(
        Arc::new(MemoryJwkStore::with_jwks(jwks)),
        config,
    ))
}

pub fn service(raise_exception: bool) -> TestService {
    JwtAuthenticationService::new(
        decoder_with(primary_jwks(), test_config()),
        Arc::new(NoneVerifier),
    )
    .with_raise_exception(raise_exception)
}

/// Mock authorization server
pub struct MockAuthServer {
    pub server: MockServer,
    pub jwks_endpoint: String,
    pub introspection_endpoint: String,
}

impl MockAuthServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();

        Self {
            server,
            jwks_endpoint: format!("{}/jwks", base_url),
            introspection_endpoint: format!("{}/introspect", base_url),
        }
    }

    /// Serve `body` from the JWKS endpoint
    pub async fn mock_jwks(&self, body: &str) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.as_bytes().to_vec(), "application/json"),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve `body` from the JWKS endpoint exactly `times` times
    pub async fn mock_jwks_times(&self, body: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.as_bytes().to_vec(), "application/json"),
            )
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Fail the JWKS endpoint with `status`
    pub async fn mock_jwks_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer introspection requests with `body`
    pub async fn mock_introspection(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/introspect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Fail introspection requests with `status`
    pub async fn mock_introspection_status(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/introspect"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }
}
