//! Token issuance and verification.
//!
//! [`TokenCodec`] signs and verifies JWTs with the process [`SigningKey`].
//! Issued tokens carry exactly these claims:
//!
//! ```json
//! {
//!   "iss": "auth-app",
//!   "sub": "alice",
//!   "aud": "any",
//!   "exp": 1234567890,
//!   "iat": 1234567590
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//!
//! use ordergate_authn::{SigningKey, TokenCodec, config::TokenConfig};
//!
//! let key = SigningKey::from_hmac_secret(b"an-example-secret-of-at-least-32-bytes").unwrap();
//! let codec = TokenCodec::new(Arc::new(key), TokenConfig::default());
//!
//! let token = codec.issue("alice", Duration::from_secs(60)).unwrap();
//! let identity = codec.verify(&token).unwrap();
//! assert_eq!(identity.subject(), "alice");
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::TokenConfig,
    context::RequestContext,
    error::{AuthError, Result},
    header::credential_fingerprint,
    identity::Identity,
    signing_key::SigningKey,
    validation::{read_algorithm, validate_algorithm},
    verifier::TokenVerifier,
};

/// Claims carried by issued tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,
    /// Subject: the authenticated username.
    pub sub: String,
    /// Audience.
    pub aud: String,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Issued at (seconds since epoch).
    pub iat: i64,
}

impl TokenClaims {
    /// Converts verified claims into an identity.
    ///
    /// The subject becomes the identity subject; `iss`, `iat` and `exp` are
    /// kept as extensions.
    #[must_use]
    pub fn into_identity(self) -> Identity {
        Identity::new(self.sub)
            .with_extension("iss", self.iss)
            .with_extension("iat", self.iat)
            .with_extension("exp", self.exp)
    }
}

/// Issues and verifies signed tokens.
///
/// Cheap to clone; the key is shared.
#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<SigningKey>,
    config: TokenConfig,
    validation: Validation,
}

impl TokenCodec {
    /// Creates a codec for `key` with the issuer, audience and lifetime in `config`.
    #[must_use]
    pub fn new(key: Arc<SigningKey>, config: TokenConfig) -> Self {
        let mut validation = Validation::new(key.algorithm().jwt_algorithm());
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = config.leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = false;

        Self { key, config, validation }
    }

    /// The token configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issues a token for `subject` valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenIssuance`] if `subject` is empty or signing fails.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String> {
        self.issue_at(subject, Utc::now(), ttl)
    }

    /// Issues a token for `subject` with the configured default lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenIssuance`] if `subject` is empty or signing fails.
    pub fn issue_default(&self, subject: &str) -> Result<String> {
        self.issue(subject, self.config.ttl)
    }

    /// Issues a token as if at `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenIssuance`] if `subject` is empty, the
    /// lifetime overflows, or signing fails.
    pub fn issue_at(&self, subject: &str, issued_at: DateTime<Utc>, ttl: Duration) -> Result<String> {
        if subject.is_empty() {
            return Err(AuthError::TokenIssuance("subject cannot be empty".to_owned()));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| AuthError::TokenIssuance("token lifetime out of range".to_owned()))?;

        let claims = TokenClaims {
            iss: self.config.issuer.clone(),
            sub: subject.to_owned(),
            aud: self.config.audience.clone(),
            exp: (issued_at + ttl).timestamp(),
            iat: issued_at.timestamp(),
        };

        let header = Header::new(self.key.algorithm().jwt_algorithm());
        let token = encode(&header, &claims, self.key.encoding_key())
            .map_err(|e| AuthError::TokenIssuance(e.to_string()))?;

        tracing::debug!(
            subject,
            exp = claims.exp,
            token = %credential_fingerprint(&token),
            "Token issued"
        );

        Ok(token)
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Checks run in this order: structure and algorithm, signature, expiry,
    /// issuer and audience.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] for structural problems or wrong claims
    /// - [`AuthError::AlgorithmMismatch`] if the header names another algorithm
    /// - [`AuthError::SignatureMismatch`] if the signature does not verify
    /// - [`AuthError::TokenExpired`] if `exp` has passed
    pub fn decode_claims(&self, token: &str) -> Result<TokenClaims> {
        let alg = read_algorithm(token)?;
        validate_algorithm(&alg, self.key.algorithm())?;

        let data = decode::<TokenClaims>(token, self.key.decoding_key(), &self.validation)?;
        if data.claims.sub.is_empty() {
            return Err(AuthError::malformed_token("subject claim is empty"));
        }

        Ok(data.claims)
    }

    /// Verifies `token` and resolves it to an identity.
    ///
    /// # Errors
    ///
    /// See [`decode_claims`](Self::decode_claims).
    #[tracing::instrument(skip(self, token), fields(token = %credential_fingerprint(token)))]
    pub fn verify(&self, token: &str) -> Result<Identity> {
        self.decode_claims(token).map(TokenClaims::into_identity)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.key.algorithm())
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish()
    }
}

#[async_trait]
impl TokenVerifier for TokenCodec {
    async fn verify_token(&self, _ctx: &RequestContext, token: &str) -> Result<Identity> {
        self.verify(token)
    }
}
