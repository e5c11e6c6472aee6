//! `Authorization` header parsing.
//!
//! Splits `<Scheme> <credential>` and decodes Basic payloads. Nothing here
//! logs or stores the credential itself; [`credential_fingerprint`] is the
//! only form in which a credential may appear in logs.

use base64::{Engine, engine::general_purpose::STANDARD};
use http::{HeaderMap, header::AUTHORIZATION};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::AuthError;

/// Number of hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 12;

/// A parsed `Authorization` header, borrowing from the request.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationHeader<'a> {
    /// The scheme token as sent (case preserved).
    pub scheme: &'a str,
    /// Everything after the scheme, with surrounding whitespace trimmed.
    pub credential: &'a str,
}

impl std::fmt::Debug for AuthorizationHeader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationHeader")
            .field("scheme", &self.scheme)
            .field("credential", &credential_fingerprint(self.credential))
            .finish()
    }
}

/// Decoded Basic credentials.
pub struct BasicCredentials {
    /// The username. May be empty; verifiers reject that.
    pub username: String,
    /// The password, scrubbed from memory on drop. May be empty.
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Extracts the scheme and credential from the request's `Authorization` header.
///
/// The scheme is the first whitespace-delimited word.
///
/// # Errors
///
/// - [`AuthError::MissingCredentials`] if the header is absent
/// - [`AuthError::MalformedCredential`] if it is not visible ASCII, or has no
///   credential after the scheme
pub fn parse_authorization(headers: &HeaderMap) -> Result<AuthorizationHeader<'_>, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingCredentials)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::malformed_credential("Authorization header is not valid ASCII"))?
        .trim();

    let (scheme, credential) = value
        .split_once(char::is_whitespace)
        .map(|(scheme, rest)| (scheme, rest.trim()))
        .unwrap_or((value, ""));

    if scheme.is_empty() {
        return Err(AuthError::malformed_credential("Authorization header is empty"));
    }
    if credential.is_empty() {
        return Err(AuthError::malformed_credential(format!("{scheme} credential is missing")));
    }

    Ok(AuthorizationHeader { scheme, credential })
}

/// Decodes a Basic payload (`base64(username:password)`).
///
/// The split happens at the first `:`, so passwords may contain colons.
/// Empty usernames or passwords are returned as-is for the verifier to reject.
///
/// # Errors
///
/// Returns [`AuthError::MalformedCredential`] if the payload is not base64,
/// not UTF-8, or has no `:`.
pub fn decode_basic(payload: &str) -> Result<BasicCredentials, AuthError> {
    let decoded = Zeroizing::new(
        STANDARD
            .decode(payload)
            .map_err(|_| AuthError::malformed_credential("Basic payload is not valid base64"))?,
    );
    let decoded = std::str::from_utf8(&decoded)
        .map_err(|_| AuthError::malformed_credential("Basic payload is not valid UTF-8"))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::malformed_credential("Basic payload has no ':' separator"))?;

    Ok(BasicCredentials {
        username: username.to_owned(),
        password: Zeroizing::new(password.to_owned()),
    })
}

/// Short, stable, non-reversible label for a credential, safe to log.
#[must_use]
pub fn credential_fingerprint(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}
