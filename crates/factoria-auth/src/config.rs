//! JWT bearer authentication policy
//!
//! [`JwtBearerAuthConfig`] declares what the service trusts: the signature
//! algorithms, the audience of this server, the remotely authorized audiences
//! and issuers, and the clock-skew leeway.
//!
//! Every construction path (builder, serde, config file) funnels through the
//! same validation, so a config value that exists is a valid one.
//!
//! # Loading from a file
//!
//! ```toml
//! audience = "https://api.example.com"
//! authorized_algorithms = ["RS256", "ES256"]
//! authorized_audiences = "api1, api2"
//! authorized_issuers = ["https://auth.example.com"]
//! leeway_seconds = 30
//! ```
//!
//! Environment variables prefixed with `FACTORIA_AUTH_` override file values
//! (`FACTORIA_AUTH_LEEWAY_SECONDS=60`).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default environment variable prefix for [`JwtBearerAuthConfig::from_file`]
pub const DEFAULT_ENV_PREFIX: &str = "FACTORIA_AUTH";

/// Asymmetric algorithms accepted when none are configured
pub const DEFAULT_ALGORITHMS: [Algorithm; 9] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Symmetric, `none` or unknown algorithm identifiers
    #[error("Invalid algorithms: {}", .0.join(", "))]
    InvalidAlgorithms(Vec<String>),

    /// An audiences or issuers list normalized to nothing
    #[error("Invalid value for '{field}': empty list after processing")]
    EmptyList {
        /// Offending field
        field: &'static str,
    },

    /// `audience` was not provided
    #[error("Missing required field 'audience'")]
    MissingAudience,

    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Config crate error (parse, type mismatch, validation inside deserialization)
    #[error("Configuration parse error: {0}")]
    Parse(#[from] config::ConfigError),
}

/// A list given either as a comma-separated string or as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListInput {
    /// `"a, b, c"`
    Text(String),
    /// `["a", "b", "c"]`
    List(Vec<String>),
}

impl From<&str> for ListInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ListInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for ListInput {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for ListInput {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ListInput {
    fn from(value: [&str; N]) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Unvalidated configuration, as read from serde sources
///
/// Unknown fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJwtBearerAuthConfig {
    /// Audience of this server
    #[serde(default)]
    pub audience: Option<String>,
    /// Accepted signature algorithms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_algorithms: Option<ListInput>,
    /// Accepted `aud` values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_audiences: Option<ListInput>,
    /// Accepted `iss` values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_issuers: Option<ListInput>,
    /// Clock-skew tolerance in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leeway_seconds: Option<u64>,
}

/// Validated JWT bearer authentication policy
///
/// Immutable: fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawJwtBearerAuthConfig", into = "RawJwtBearerAuthConfig")]
pub struct JwtBearerAuthConfig {
    audience: String,
    authorized_algorithms: Vec<Algorithm>,
    authorized_audiences: Option<Vec<String>>,
    authorized_issuers: Option<Vec<String>>,
    leeway_seconds: u64,
}

impl JwtBearerAuthConfig {
    /// Start a builder for the given server audience
    pub fn builder(audience: impl Into<String>) -> JwtBearerAuthConfigBuilder {
        JwtBearerAuthConfigBuilder {
            raw: RawJwtBearerAuthConfig {
                audience: Some(audience.into()),
                ..RawJwtBearerAuthConfig::default()
            },
        }
    }

    /// Config with the given audience and every default
    ///
    /// # Errors
    ///
    /// Never fails for the defaults; returns `Result` to share the validation path.
    pub fn new(audience: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder(audience).build()
    }

    /// Load configuration from a file, overridden by `FACTORIA_AUTH_*` env vars
    ///
    /// Supports TOML, YAML and JSON, picked by extension.
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, has an unsupported extension, or
    /// holds an invalid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, DEFAULT_ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file).
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        Self::from_file_with_environment(path, Self::environment(env_prefix))
    }

    /// Environment source used by the file loaders
    ///
    /// `<PREFIX>_LEEWAY_SECONDS` maps to `leeway_seconds`; numeric values are
    /// parsed.
    pub fn environment(env_prefix: &str) -> config::Environment {
        config::Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Load configuration from a file overlaid by an explicit environment source
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file).
    pub fn from_file_with_environment(
        path: impl AsRef<Path>,
        environment: config::Environment,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment)
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        tracing::debug!(
            path = %path.display(),
            audience = %loaded.audience,
            algorithms = ?loaded.authorized_algorithms,
            "Loaded JWT bearer authentication config"
        );
        Ok(loaded)
    }

    /// Audience of this server
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Accepted signature algorithms, in configured order
    pub fn authorized_algorithms(&self) -> &[Algorithm] {
        &self.authorized_algorithms
    }

    /// Accepted `aud` values, when restricted
    pub fn authorized_audiences(&self) -> Option<&[String]> {
        self.authorized_audiences.as_deref()
    }

    /// Accepted `iss` values, when restricted
    pub fn authorized_issuers(&self) -> Option<&[String]> {
        self.authorized_issuers.as_deref()
    }

    /// Clock-skew tolerance in seconds
    pub fn leeway_seconds(&self) -> u64 {
        self.leeway_seconds
    }

    /// Clock-skew tolerance
    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_seconds)
    }

    /// Whether tokens signed with `alg` are accepted
    pub fn is_algorithm_authorized(&self, alg: Algorithm) -> bool {
        self.authorized_algorithms.contains(&alg)
    }
}

impl TryFrom<RawJwtBearerAuthConfig> for JwtBearerAuthConfig {
    type Error = ConfigError;

    fn try_from(raw: RawJwtBearerAuthConfig) -> Result<Self, Self::Error> {
        let audience = raw.audience.ok_or(ConfigError::MissingAudience)?;

        let authorized_algorithms = match raw.authorized_algorithms {
            Some(input) => parse_algorithms(list_entries(input))?,
            None => DEFAULT_ALGORITHMS.to_vec(),
        };

        Ok(Self {
            audience,
            authorized_algorithms,
            authorized_audiences: raw
                .authorized_audiences
                .map(|input| normalize_list(input, "authorized_audiences"))
                .transpose()?,
            authorized_issuers: raw
                .authorized_issuers
                .map(|input| normalize_list(input, "authorized_issuers"))
                .transpose()?,
            leeway_seconds: raw.leeway_seconds.unwrap_or(0),
        })
    }
}

impl From<JwtBearerAuthConfig> for RawJwtBearerAuthConfig {
    fn from(config: JwtBearerAuthConfig) -> Self {
        Self {
            audience: Some(config.audience),
            authorized_algorithms: Some(ListInput::List(
                config
                    .authorized_algorithms
                    .iter()
                    .map(|alg| format!("{alg:?}"))
                    .collect(),
            )),
            authorized_audiences: config.authorized_audiences.map(ListInput::List),
            authorized_issuers: config.authorized_issuers.map(ListInput::List),
            leeway_seconds: Some(config.leeway_seconds),
        }
    }
}

fn list_entries(input: ListInput) -> Vec<String> {
    match input {
        ListInput::Text(text) => text.split(',').map(str::to_string).collect(),
        ListInput::List(items) => items,
    }
}

/// Trim entries, drop blanks, drop duplicates keeping the first occurrence
fn normalize_list(input: ListInput, field: &'static str) -> Result<Vec<String>, ConfigError> {
    let mut normalized: Vec<String> = Vec::new();
    for entry in list_entries(input) {
        let entry = entry.trim();
        if entry.is_empty() || normalized.iter().any(|seen| seen == entry) {
            continue;
        }
        normalized.push(entry.to_string());
    }

    if normalized.is_empty() {
        return Err(ConfigError::EmptyList { field });
    }
    Ok(normalized)
}

/// Parse algorithm names, rejecting HMAC, `none` and unknown identifiers
///
/// Blank entries are dropped.
fn parse_algorithms(names: Vec<String>) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::with_capacity(names.len());
    let mut invalid = Vec::new();

    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        match Algorithm::from_str(trimmed) {
            Ok(Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) | Err(_) => {
                invalid.push(trimmed.to_string());
            }
            Ok(alg) => algorithms.push(alg),
        }
    }

    if !invalid.is_empty() {
        return Err(ConfigError::InvalidAlgorithms(invalid));
    }
    Ok(algorithms)
}

/// Builder for [`JwtBearerAuthConfig`]
#[derive(Debug, Clone)]
pub struct JwtBearerAuthConfigBuilder {
    raw: RawJwtBearerAuthConfig,
}

impl JwtBearerAuthConfigBuilder {
    /// Accepted signature algorithms (names such as `"RS256"`)
    pub fn authorized_algorithms(mut self, algorithms: impl Into<ListInput>) -> Self {
        self.raw.authorized_algorithms = Some(algorithms.into());
        self
    }

    /// Accepted `aud` values (comma-separated string or list)
    pub fn authorized_audiences(mut self, audiences: impl Into<ListInput>) -> Self {
        self.raw.authorized_audiences = Some(audiences.into());
        self
    }

    /// Accepted `iss` values (comma-separated string or list)
    pub fn authorized_issuers(mut self, issuers: impl Into<ListInput>) -> Self {
        self.raw.authorized_issuers = Some(issuers.into());
        self
    }

    /// Clock-skew tolerance in seconds
    pub fn leeway_seconds(mut self, leeway: u64) -> Self {
        self.raw.leeway_seconds = Some(leeway);
        self
    }

    /// Validate and build
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAlgorithms`] or [`ConfigError::EmptyList`].
    pub fn build(self) -> Result<JwtBearerAuthConfig, ConfigError> {
        JwtBearerAuthConfig::try_from(self.raw)
    }
}
