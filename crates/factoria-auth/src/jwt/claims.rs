//! Validated JWT claims
//!
//! [`JwtPayload`] is built from the raw claims map produced by the decoder.
//! Construction normalizes the claims:
//!
//! - `scope` (alias `scp`) and `aud` become lower-cased string lists. A
//!   space-separated string or a JSON array are both accepted.
//! - `exp`, `iat` and `nbf` become UTC datetimes at whole-second precision. An
//!   integer Unix timestamp, a numeric string or a datetime are accepted.
//! - `iss` and `sub` must be strings.
//! - Unknown claims are ignored.
//!
//! Serializing a payload yields `scope`/`aud` as arrays and timestamps as
//! integer seconds, so the output validates back into an equal payload.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Earliest accepted timestamp (0001-01-01T00:00:00Z)
pub const MIN_TIMESTAMP: i64 = -62_135_596_800;
/// Latest accepted timestamp (9999-12-31T23:59:59Z)
pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

/// Errors raised while validating claims
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// A string list normalized to nothing
    #[error("Invalid value: empty list after processing")]
    EmptyList,

    /// A string list field held something other than a string or array
    #[error("Invalid value type: expected str or list")]
    ExpectedStringOrList,

    /// A timestamp string was not an integer
    #[error("Invalid timestamp string: '{0}'")]
    InvalidTimestampString(String),

    /// A timestamp fell outside 0001-01-01..9999-12-31
    #[error("Invalid timestamp value: {0}")]
    InvalidTimestampValue(String),

    /// A timestamp field held a float, boolean, array, object or null
    #[error("Invalid value type: expected int, str, or datetime")]
    ExpectedTimestamp,

    /// A plain string claim held another type
    #[error("Invalid value type: expected str")]
    ExpectedString,

    /// A required claim is absent
    #[error("Missing required claim '{0}'")]
    MissingClaim(&'static str),

    /// A claim failed validation
    #[error("Invalid claim '{claim}': {source}")]
    Claim {
        /// Claim name
        claim: &'static str,
        /// What was wrong with it
        #[source]
        source: Box<ClaimsError>,
    },
}

impl ClaimsError {
    fn for_claim(claim: &'static str) -> impl FnOnce(ClaimsError) -> ClaimsError {
        move |source| ClaimsError::Claim {
            claim,
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping [`ClaimsError::Claim`] wrappers
    pub fn root(&self) -> &ClaimsError {
        match self {
            Self::Claim { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the offending claim, when known
    pub fn claim(&self) -> Option<&'static str> {
        match self {
            Self::Claim { claim, .. } | Self::MissingClaim(claim) => Some(*claim),
            _ => None,
        }
    }
}

/// Normalize a scope-like claim into a list of lower-cased strings
///
/// - string: lower-cased and split on whitespace
/// - array: `null` entries dropped, numbers and booleans stringified, each
///   entry trimmed and lower-cased, blank entries dropped
///
/// # Errors
///
/// [`ClaimsError::EmptyList`] when nothing is left and
/// [`ClaimsError::ExpectedStringOrList`] for any other JSON type.
pub fn validate_string_list_field(value: &Value) -> Result<Vec<String>, ClaimsError> {
    let items: Vec<String> = match value {
        Value::String(text) => text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::Null => None,
                Value::String(s) => Some(s.trim().to_lowercase()),
                other => Some(other.to_string().to_lowercase()),
            })
            .filter(|entry| !entry.is_empty())
            .collect(),
        _ => return Err(ClaimsError::ExpectedStringOrList),
    };

    if items.is_empty() {
        return Err(ClaimsError::EmptyList);
    }
    Ok(items)
}

/// Accepted shapes for a timestamp claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampInput {
    /// Timezone-aware datetime
    DateTime(DateTime<Utc>),
    /// Naive datetime, taken as UTC
    Naive(NaiveDateTime),
    /// Unix timestamp in seconds
    Seconds(i64),
    /// Unix timestamp in seconds, as text
    Text(String),
}

impl TimestampInput {
    /// Classify a raw JSON claim value
    ///
    /// # Errors
    ///
    /// [`ClaimsError::ExpectedTimestamp`] for floats, booleans, arrays, objects
    /// and `null`; [`ClaimsError::InvalidTimestampValue`] for integers that do
    /// not fit in `i64`.
    pub fn from_json(value: &Value) -> Result<Self, ClaimsError> {
        match value {
            Value::Number(n) => {
                if let Some(seconds) = n.as_i64() {
                    Ok(Self::Seconds(seconds))
                } else if n.is_u64() {
                    Err(ClaimsError::InvalidTimestampValue(n.to_string()))
                } else {
                    Err(ClaimsError::ExpectedTimestamp)
                }
            }
            Value::String(text) => Ok(Self::Text(text.clone())),
            _ => Err(ClaimsError::ExpectedTimestamp),
        }
    }
}

impl From<DateTime<Utc>> for TimestampInput {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<NaiveDateTime> for TimestampInput {
    fn from(value: NaiveDateTime) -> Self {
        Self::Naive(value)
    }
}

impl From<i64> for TimestampInput {
    fn from(value: i64) -> Self {
        Self::Seconds(value)
    }
}

impl From<&str> for TimestampInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TimestampInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Normalize a timestamp claim into a UTC datetime at whole-second precision
///
/// # Errors
///
/// [`ClaimsError::InvalidTimestampString`] for non-integer text and
/// [`ClaimsError::InvalidTimestampValue`] outside 0001-01-01..9999-12-31.
pub fn validate_timestamp_field(value: TimestampInput) -> Result<DateTime<Utc>, ClaimsError> {
    let seconds = match value {
        TimestampInput::DateTime(dt) => dt.trunc_subsecs(0).timestamp(),
        TimestampInput::Naive(naive) => naive.and_utc().trunc_subsecs(0).timestamp(),
        TimestampInput::Seconds(seconds) => seconds,
        TimestampInput::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| ClaimsError::InvalidTimestampString(text.clone()))?,
    };

    if !(MIN_TIMESTAMP..=MAX_TIMESTAMP).contains(&seconds) {
        return Err(ClaimsError::InvalidTimestampValue(seconds.to_string()));
    }

    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| ClaimsError::InvalidTimestampValue(seconds.to_string()))
}

/// Claims of a verified JWT bearer token
///
/// Immutable once built. Use [`JwtPayload::from_claims`] (or serde) on a raw
/// claims map, or [`JwtPayload::builder`] in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct JwtPayload {
    scope: Vec<String>,
    aud: Vec<String>,
    iss: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    exp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    nbf: DateTime<Utc>,
    sub: String,
}

impl JwtPayload {
    /// Validate a raw claims map
    ///
    /// `scp` is read when `scope` is absent.
    ///
    /// # Errors
    ///
    /// A [`ClaimsError::MissingClaim`] or a [`ClaimsError::Claim`] naming the
    /// first invalid claim.
    pub fn from_claims(claims: &Map<String, Value>) -> Result<Self, ClaimsError> {
        let scope_value = claims
            .get("scope")
            .or_else(|| claims.get("scp"))
            .ok_or(ClaimsError::MissingClaim("scope"))?;

        Ok(Self {
            scope: validate_string_list_field(scope_value).map_err(ClaimsError::for_claim("scope"))?,
            aud: validate_string_list_field(required(claims, "aud")?)
                .map_err(ClaimsError::for_claim("aud"))?,
            iss: string_claim(claims, "iss")?,
            exp: timestamp_claim(claims, "exp")?,
            iat: timestamp_claim(claims, "iat")?,
            nbf: timestamp_claim(claims, "nbf")?,
            sub: string_claim(claims, "sub")?,
        })
    }

    /// Start building a payload in code
    pub fn builder() -> JwtPayloadBuilder {
        JwtPayloadBuilder::default()
    }

    /// Granted scopes, lower-cased
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Whether `scope` contains the given entry (case-insensitive)
    pub fn has_scope(&self, scope: &str) -> bool {
        let scope = scope.to_lowercase();
        self.scope.iter().any(|s| *s == scope)
    }

    /// Audiences, lower-cased
    pub fn aud(&self) -> &[String] {
        &self.aud
    }

    /// Issuer
    pub fn iss(&self) -> &str {
        &self.iss
    }

    /// Expiration time
    pub fn exp(&self) -> DateTime<Utc> {
        self.exp
    }

    /// Issued-at time
    pub fn iat(&self) -> DateTime<Utc> {
        self.iat
    }

    /// Not-before time
    pub fn nbf(&self) -> DateTime<Utc> {
        self.nbf
    }

    /// Subject
    pub fn sub(&self) -> &str {
        &self.sub
    }
}

impl TryFrom<Map<String, Value>> for JwtPayload {
    type Error = ClaimsError;

    fn try_from(claims: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_claims(&claims)
    }
}

fn required<'a>(claims: &'a Map<String, Value>, claim: &'static str) -> Result<&'a Value, ClaimsError> {
    claims.get(claim).ok_or(ClaimsError::MissingClaim(claim))
}

fn string_claim(claims: &Map<String, Value>, claim: &'static str) -> Result<String, ClaimsError> {
    match required(claims, claim)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(ClaimsError::for_claim(claim)(ClaimsError::ExpectedString)),
    }
}

fn timestamp_claim(
    claims: &Map<String, Value>,
    claim: &'static str,
) -> Result<DateTime<Utc>, ClaimsError> {
    TimestampInput::from_json(required(claims, claim)?)
        .and_then(validate_timestamp_field)
        .map_err(ClaimsError::for_claim(claim))
}

/// Builder for [`JwtPayload`]
///
/// Accepts the same input shapes as the raw claims map and runs the same
/// validation in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct JwtPayloadBuilder {
    scope: Option<Value>,
    aud: Option<Value>,
    iss: Option<String>,
    exp: Option<TimestampInput>,
    iat: Option<TimestampInput>,
    nbf: Option<TimestampInput>,
    sub: Option<String>,
}

impl JwtPayloadBuilder {
    /// Scopes as a space-separated string or a list
    pub fn scope(mut self, scope: impl Into<Value>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Audiences as a space-separated string or a list
    pub fn aud(mut self, aud: impl Into<Value>) -> Self {
        self.aud = Some(aud.into());
        self
    }

    /// Issuer
    pub fn iss(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Expiration time
    pub fn exp(mut self, exp: impl Into<TimestampInput>) -> Self {
        self.exp = Some(exp.into());
        self
    }

    /// Issued-at time
    pub fn iat(mut self, iat: impl Into<TimestampInput>) -> Self {
        self.iat = Some(iat.into());
        self
    }

    /// Not-before time
    pub fn nbf(mut self, nbf: impl Into<TimestampInput>) -> Self {
        self.nbf = Some(nbf.into());
        self
    }

    /// Subject
    pub fn sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Validate and build the payload
    ///
    /// # Errors
    ///
    /// Same as [`JwtPayload::from_claims`].
    pub fn build(self) -> Result<JwtPayload, ClaimsError> {
        let list = |value: Option<Value>, claim: &'static str| {
            let value = value.ok_or(ClaimsError::MissingClaim(claim))?;
            validate_string_list_field(&value).map_err(ClaimsError::for_claim(claim))
        };
        let timestamp = |value: Option<TimestampInput>, claim: &'static str| {
            let value = value.ok_or(ClaimsError::MissingClaim(claim))?;
            validate_timestamp_field(value).map_err(ClaimsError::for_claim(claim))
        };

        Ok(JwtPayload {
            scope: list(self.scope, "scope")?,
            aud: list(self.aud, "aud")?,
            iss: self.iss.ok_or(ClaimsError::MissingClaim("iss"))?,
            exp: timestamp(self.exp, "exp")?,
            iat: timestamp(self.iat, "iat")?,
            nbf: timestamp(self.nbf, "nbf")?,
            sub: self.sub.ok_or(ClaimsError::MissingClaim("sub"))?,
        })
    }
}
