//! Shared test utilities for authentication testing.
//!
//! Key generation, raw JWT crafting (for attack tests), header builders and
//! verifiers that count their invocations. Feature-gated behind `testutil`
//! so none of this reaches production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! ordergate-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use ordergate_authn::testutil::{CountingPasswordVerifier, basic_headers};
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::Utc;
use ed25519_dalek::pkcs8::{EncodePrivateKey, spki::der::pem::LineEnding};
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use ordergate_storage::StorageError;
use parking_lot::RwLock;
use rand_core::{OsRng, RngCore};

use crate::{
    config::TokenConfig,
    context::RequestContext,
    error::{AuthError, Result},
    identity::Identity,
    jwt::TokenCodec,
    signing_key::SigningKey,
    verifier::{PasswordVerifier, TokenVerifier},
};

/// Generates a fresh Ed25519 private key as PKCS#8 PEM (`PRIVATE KEY` label).
///
/// # Panics
///
/// Panics if PEM encoding fails (should not happen).
pub fn generate_ed25519_pem() -> String {
    let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
    signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("Failed to encode test key as PEM")
        .to_string()
}

/// Generates a random 48-byte HMAC secret.
pub fn generate_hmac_secret() -> Vec<u8> {
    let mut secret = vec![0u8; 48];
    OsRng.fill_bytes(&mut secret);
    secret
}

/// A codec over a fresh Ed25519 key with default token settings.
///
/// # Panics
///
/// Panics if the generated key is rejected (should not happen).
pub fn ed25519_codec() -> TokenCodec {
    let key = SigningKey::from_ed25519_pem(&generate_ed25519_pem()).expect("valid Ed25519 key");
    TokenCodec::new(Arc::new(key), TokenConfig::default())
}

/// A codec over a fresh HS256 secret with default token settings.
///
/// # Panics
///
/// Panics if the generated secret is rejected (should not happen).
pub fn hmac_codec() -> TokenCodec {
    let key = SigningKey::from_hmac_secret(&generate_hmac_secret()).expect("valid HMAC secret");
    TokenCodec::new(Arc::new(key), TokenConfig::default())
}

/// Claims that pass validation under [`TokenConfig::default`], expiring in one hour.
pub fn valid_claims(subject: &str) -> serde_json::Value {
    let now = Utc::now().timestamp();
    serde_json::json!({
        "iss": "auth-app",
        "sub": subject,
        "aud": "any",
        "exp": now + 3600,
        "iat": now,
    })
}

/// Signs `claims` with HS256 under `secret`, whatever the verifier expects.
///
/// # Panics
///
/// Panics if JWT encoding fails.
pub fn sign_hs256(secret: &[u8], claims: &serde_json::Value) -> String {
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret))
        .expect("Failed to encode test JWT")
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The result is `{header_b64}.{payload_b64}.` with an empty signature,
/// useful for `alg: "none"` and other hand-built attack tokens.
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// A header map holding `Authorization: {value}`.
///
/// # Panics
///
/// Panics if `value` is not a valid header value.
pub fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("valid header value"));
    headers
}

/// The raw Basic payload for `username:password`.
pub fn basic_payload(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{username}:{password}"))
}

/// A header map with Basic credentials.
pub fn basic_headers(username: &str, password: &str) -> HeaderMap {
    headers_with(&format!("Basic {}", basic_payload(username, password)))
}

/// A header map with a Bearer token.
pub fn bearer_headers(token: &str) -> HeaderMap {
    headers_with(&format!("Bearer {token}"))
}

/// In-memory [`PasswordVerifier`] that counts invocations.
///
/// Follows the same failure rules as
/// [`StoredPasswordVerifier`](crate::StoredPasswordVerifier) without bcrypt,
/// and can be slowed down or switched into a simulated outage.
#[derive(Debug, Default)]
pub struct CountingPasswordVerifier {
    users: RwLock<HashMap<String, String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    unavailable: AtomicBool,
}

impl CountingPasswordVerifier {
    /// Creates a verifier with no users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user.
    #[must_use]
    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.users.write().insert(username.to_owned(), password.to_owned());
        self
    }

    /// Sleeps for `delay` inside every verification.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Simulates a credential store outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of verifications started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PasswordVerifier for CountingPasswordVerifier {
    async fn verify_password(
        &self,
        _ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::StoreUnavailable(StorageError::connection("simulated outage")));
        }

        match self.users.read().get(username) {
            None => Err(AuthError::UnknownUser),
            Some(stored) if stored != password => Err(AuthError::PasswordMismatch),
            Some(_) => Ok(Identity::new(username)),
        }
    }
}

/// [`TokenVerifier`] wrapping a [`TokenCodec`] that counts invocations.
#[derive(Debug)]
pub struct CountingTokenVerifier {
    codec: TokenCodec,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingTokenVerifier {
    /// Wraps `codec`.
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec, calls: AtomicUsize::new(0), delay: None }
    }

    /// Sleeps for `delay` inside every verification.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The wrapped codec, for issuing tokens in tests.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Number of verifications started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenVerifier for CountingTokenVerifier {
    async fn verify_token(&self, _ctx: &RequestContext, token: &str) -> Result<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.codec.verify(token)
    }
}
