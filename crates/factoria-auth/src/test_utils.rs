//! Shared fixtures for unit tests

use chrono::Utc;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};

pub(crate) const PRIMARY_KID: &str = "primary";
pub(crate) const EDWARDS_KID: &str = "edwards";
pub(crate) const ISSUER: &str = "https://auth.example.com";
pub(crate) const AUDIENCE: &str = "api1";

const RSA_PRIMARY_PEM: &str = include_str!("../tests/fixtures/rsa_primary.pem");
const RSA_ROTATED_PEM: &str = include_str!("../tests/fixtures/rsa_rotated.pem");
const ED25519_PEM: &str = include_str!("../tests/fixtures/ed25519.pem");
const JWKS_JSON: &str = include_str!("../tests/fixtures/jwks.json");

/// Key set with the primary RSA key and the Ed25519 key
pub(crate) fn primary_jwks() -> JwkSet {
    serde_json::from_str(JWKS_JSON).unwrap()
}

/// Key set of RSA keys with the given ids, all sharing the primary modulus
pub(crate) fn jwks_with_kids(kids: &[&str]) -> JwkSet {
    let template = primary_jwks()
        .find(PRIMARY_KID)
        .cloned()
        .unwrap();
    let keys = kids
        .iter()
        .map(|kid| {
            let mut jwk: Jwk = template.clone();
            jwk.common.key_id = Some((*kid).to_string());
            jwk
        })
        .collect();
    JwkSet { keys }
}

/// Claims valid for an hour, issued by [`ISSUER`] for [`AUDIENCE`]
pub(crate) fn valid_claims() -> Map<String, Value> {
    let now = Utc::now().timestamp();
    match json!({
        "scope": "read write",
        "aud": [AUDIENCE],
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

/// Sign claims with the primary RSA key (RS256)
pub(crate) fn sign_rs256(claims: &Map<String, Value>, kid: Option<&str>) -> String {
    sign(claims, Algorithm::RS256, kid, &EncodingKey::from_rsa_pem(RSA_PRIMARY_PEM.as_bytes()).unwrap())
}

/// Sign claims with the rotated RSA key, which is absent from [`primary_jwks`]
pub(crate) fn sign_rotated(claims: &Map<String, Value>, kid: &str) -> String {
    sign(
        claims,
        Algorithm::RS256,
        Some(kid),
        &EncodingKey::from_rsa_pem(RSA_ROTATED_PEM.as_bytes()).unwrap(),
    )
}

/// Sign claims with the Ed25519 key
pub(crate) fn sign_eddsa(claims: &Map<String, Value>) -> String {
    sign(
        claims,
        Algorithm::EdDSA,
        Some(EDWARDS_KID),
        &EncodingKey::from_ed_pem(ED25519_PEM.as_bytes()).unwrap(),
    )
}

/// Sign claims with an HMAC secret
pub(crate) fn sign_hs256(claims: &Map<String, Value>, kid: &str) -> String {
    sign(claims, Algorithm::HS256, Some(kid), &EncodingKey::from_secret(b"shared-secret"))
}

fn sign(claims: &Map<String, Value>, alg: Algorithm, kid: Option<&str>, key: &EncodingKey) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, key).unwrap()
}
