//! Configuration types for the authentication gateway.
//!
//! The gateway does not load configuration itself. These types are meant to
//! be embedded in the host's own configuration and deserialized with it;
//! durations use human-readable strings such as `"10m"` or `"60s"`.
//!
//! ```
//! use ordergate_authn::config::AuthConfig;
//!
//! let config: AuthConfig = serde_json::from_str(
//!     r#"{ "cache": { "ttl": "2m" }, "token": { "issuer": "orders-api" } }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.cache.ttl.as_secs(), 120);
//! assert_eq!(config.cache.max_entries, 10_000);
//! assert_eq!(config.token.audience, "any");
//! ```

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signing_key::KeyAlgorithm;

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Dotted path of the offending field.
        field: &'static str,
    },

    /// The cache capacity was zero.
    #[error("cache.max_entries must be greater than zero")]
    ZeroCapacity,

    /// A required string was empty.
    #[error("{field} cannot be empty")]
    Empty {
        /// Dotted path of the offending field.
        field: &'static str,
    },
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_max_entries() -> usize {
    10_000
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_issuer() -> String {
    "auth-app".to_owned()
}

fn default_audience() -> String {
    "any".to_owned()
}

fn default_token_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_env_var() -> String {
    "PRIVATE_KEY".to_owned()
}

fn default_key_file() -> PathBuf {
    PathBuf::from("key/jwt_ed25519.pem")
}

/// Settings for the shared [`ExpiringCache`](crate::ExpiringCache).
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Lifetime of a cached authentication decision.
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    #[builder(default = default_cache_ttl())]
    pub ttl: Duration,

    /// Maximum number of cached decisions.
    #[serde(default = "default_max_entries")]
    #[builder(default = default_max_entries())]
    pub max_entries: usize,

    /// How often expired entries are swept. Zero disables the sweep and
    /// relies on lazy expiry and eviction alone.
    #[serde(with = "humantime_serde", default = "default_sweep_interval")]
    #[builder(default = default_sweep_interval())]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            max_entries: default_max_entries(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    /// Checks that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero TTL or zero capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroDuration { field: "cache.ttl" });
        }
        if self.max_entries == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

/// Claims and lifetime of issued tokens.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// `iss` claim written on issue and required on verify.
    #[serde(default = "default_issuer")]
    #[builder(into, default = default_issuer())]
    pub issuer: String,

    /// `aud` claim written on issue and required on verify.
    #[serde(default = "default_audience")]
    #[builder(into, default = default_audience())]
    pub audience: String,

    /// Default token lifetime.
    #[serde(with = "humantime_serde", default = "default_token_ttl")]
    #[builder(default = default_token_ttl())]
    pub ttl: Duration,

    /// Clock skew tolerated when checking `exp`.
    #[serde(with = "humantime_serde", default)]
    #[builder(default)]
    pub leeway: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            audience: default_audience(),
            ttl: default_token_ttl(),
            leeway: Duration::ZERO,
        }
    }
}

impl TokenConfig {
    /// Checks that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty issuer or audience, or a zero TTL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Empty { field: "token.issuer" });
        }
        if self.audience.is_empty() {
            return Err(ConfigError::Empty { field: "token.audience" });
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroDuration { field: "token.ttl" });
        }
        Ok(())
    }
}

/// Where the signing key comes from.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningKeyConfig {
    /// Signing algorithm; the key material must match it.
    #[serde(default)]
    #[builder(default)]
    pub algorithm: KeyAlgorithm,

    /// Environment variable holding the key, consulted first.
    #[serde(default = "default_env_var")]
    #[builder(into, default = default_env_var())]
    pub env_var: String,

    /// Key file used when the environment variable is unset or empty.
    #[serde(default = "default_key_file")]
    #[builder(into, default = default_key_file())]
    pub key_file: PathBuf,
}

impl Default for SigningKeyConfig {
    fn default() -> Self {
        Self {
            algorithm: KeyAlgorithm::default(),
            env_var: default_env_var(),
            key_file: default_key_file(),
        }
    }
}

/// Aggregate configuration for the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Decision cache settings.
    #[serde(default)]
    #[builder(default)]
    pub cache: CacheConfig,

    /// Token settings.
    #[serde(default)]
    #[builder(default)]
    pub token: TokenConfig,

    /// Signing key source.
    #[serde(default)]
    #[builder(default)]
    pub signing_key: SigningKeyConfig,
}

impl AuthConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.token.validate()?;
        if self.signing_key.env_var.is_empty() {
            return Err(ConfigError::Empty { field: "signing_key.env_var" });
        }
        Ok(())
    }
}
