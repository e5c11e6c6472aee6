//! Authentication error types.
//!
//! [`AuthError`] is the per-request failure taxonomy. Every variant reaches
//! the HTTP layer as the same opaque 401; the distinctions exist for logs and
//! for the host's alerting (see [`AuthError::is_retryable`]).
//!
//! [`KeyError`] is separate on purpose: it describes startup failures while
//! loading signing key material, and is never produced while serving requests.

use std::path::PathBuf;

use ordergate_storage::StorageError;
use thiserror::Error;

/// Authentication failures.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The request carries no `Authorization` header.
    #[error("Missing credentials")]
    MissingCredentials,

    /// The `Authorization` header cannot be parsed for its scheme.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// No strategy is registered for the request's scheme.
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// Basic credentials with an empty username.
    #[error("Username cannot be empty")]
    EmptyUsername,

    /// Basic credentials with an empty password.
    #[error("Password cannot be empty")]
    EmptyPassword,

    /// The username has no stored credential.
    #[error("Unknown user")]
    UnknownUser,

    /// The password does not match the stored hash.
    #[error("Password does not match")]
    PasswordMismatch,

    /// The credential store could not be reached.
    ///
    /// Retryable upstream, but still an authentication failure for the
    /// request in flight.
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),

    /// The bearer token is not a well-formed JWT.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The token was signed with an algorithm other than the configured one.
    #[error("Algorithm mismatch: expected {expected}, found {found}")]
    AlgorithmMismatch {
        /// Algorithm the codec is configured for.
        expected: String,
        /// Algorithm named in the token header.
        found: String,
    },

    /// Signature verification failed.
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// The token's `exp` claim is in the past.
    #[error("Token expired")]
    TokenExpired,

    /// The request was cancelled, or its deadline elapsed, before
    /// verification finished.
    #[error("Authentication cancelled")]
    Cancelled,

    /// Signing a freshly issued token failed.
    #[error("Token issuance failed: {0}")]
    TokenIssuance(String),

    /// Hashing a new password failed.
    #[error("Password hashing failed: {0}")]
    PasswordHashing(String),
}

impl AuthError {
    /// Creates a new `MalformedCredential` error.
    #[must_use]
    pub fn malformed_credential(message: impl Into<String>) -> Self {
        Self::MalformedCredential(message.into())
    }

    /// Creates a new `UnsupportedScheme` error.
    #[must_use]
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme(scheme.into())
    }

    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken(message.into())
    }

    /// Creates a new `AlgorithmMismatch` error.
    #[must_use]
    pub fn algorithm_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::AlgorithmMismatch { expected: expected.into(), found: found.into() }
    }

    /// Stable label for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::MalformedCredential(_) => "malformed_credential",
            Self::UnsupportedScheme(_) => "unsupported_scheme",
            Self::EmptyUsername => "empty_username",
            Self::EmptyPassword => "empty_password",
            Self::UnknownUser => "unknown_user",
            Self::PasswordMismatch => "password_mismatch",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::MalformedToken(_) => "malformed_token",
            Self::AlgorithmMismatch { .. } => "algorithm_mismatch",
            Self::SignatureMismatch => "signature_mismatch",
            Self::TokenExpired => "token_expired",
            Self::Cancelled => "cancelled",
            Self::TokenIssuance(_) => "token_issuance",
            Self::PasswordHashing(_) => "password_hashing",
        }
    }

    /// Returns `true` when the failure came from an upstream outage rather
    /// than from the presented credential.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::SignatureMismatch,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAlgorithm => {
                AuthError::algorithm_mismatch("configured algorithm", "key/algorithm family")
            },
            ErrorKind::InvalidIssuer => AuthError::malformed_token("issuer validation failed"),
            ErrorKind::InvalidAudience => AuthError::malformed_token("audience validation failed"),
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::malformed_token(format!("missing claim: {claim}"))
            },
            _ => AuthError::malformed_token(format!("JWT error: {err}")),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::StoreUnavailable(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failures while loading signing key material at startup.
///
/// Any of these means the process must not serve traffic.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyError {
    /// Neither the environment variable nor the key file supplied a key.
    #[error("No signing key found: ${env_var} is unset and {} does not exist", path.display())]
    NotFound {
        /// Environment variable that was consulted.
        env_var: String,
        /// Key file that was consulted.
        path: PathBuf,
    },

    /// The key file exists but could not be read.
    #[error("Failed to read signing key file {}: {source}", path.display())]
    Io {
        /// Key file that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Key material of the wrong type for the configured algorithm.
    #[error("Signing key has the wrong type: expected {expected}, found {found}")]
    WrongType {
        /// What the configured algorithm requires.
        expected: String,
        /// What was supplied.
        found: String,
    },

    /// Key material of the right type that failed to parse.
    #[error("Invalid signing key: {0}")]
    Invalid(String),
}
