//! JWT algorithm checks.
//!
//! Runs before any signature verification. The `alg` header is read straight
//! from the token bytes, so values the JWT library cannot even represent
//! (such as `none`) are still reported precisely.
//!
//! # Security
//!
//! - `none` is always rejected
//! - any algorithm other than the one the codec is configured for is rejected,
//!   which stops an HS256 token "signed" with a public key from being accepted
//!   by an EdDSA deployment

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;

use crate::{error::AuthError, signing_key::KeyAlgorithm};

/// Algorithms that are never accepted, whatever the configuration.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "None", "NONE"];

#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: String,
}

/// Reads the `alg` header of `token` without verifying anything.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] if the token does not have three
/// segments or the header is not base64url-encoded JSON with an `alg` string.
pub fn read_algorithm(token: &str) -> Result<String, AuthError> {
    let mut parts = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::malformed_token("JWT must have 3 parts separated by dots"));
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| AuthError::malformed_token(format!("Failed to decode JWT header: {e}")))?;
    let header: RawHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::malformed_token(format!("Failed to parse JWT header: {e}")))?;

    Ok(header.alg)
}

#[derive(Debug, Deserialize)]
struct RawExpiry {
    exp: Option<i64>,
}

/// Reads the `exp` claim of `token` without verifying anything.
///
/// Only safe on tokens that were verified before, such as cached ones.
/// Returns `None` for tokens that are not JWT-shaped or carry no `exp`.
pub fn read_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice::<RawExpiry>(&bytes).ok()?.exp
}

/// Checks that `alg` is exactly the configured algorithm.
///
/// # Errors
///
/// Returns [`AuthError::AlgorithmMismatch`] for forbidden or unexpected algorithms.
///
/// # Examples
///
/// ```
/// use ordergate_authn::{KeyAlgorithm, validation::validate_algorithm};
///
/// assert!(validate_algorithm("EdDSA", KeyAlgorithm::EdDsa).is_ok());
/// assert!(validate_algorithm("HS256", KeyAlgorithm::EdDsa).is_err());
/// assert!(validate_algorithm("none", KeyAlgorithm::Hs256).is_err());
/// ```
pub fn validate_algorithm(alg: &str, expected: KeyAlgorithm) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) || alg != expected.as_str() {
        return Err(AuthError::algorithm_mismatch(expected.as_str(), alg));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::testutil::craft_raw_jwt;

    #[rstest]
    #[case::eddsa_ok("EdDSA", KeyAlgorithm::EdDsa, true)]
    #[case::hs256_ok("HS256", KeyAlgorithm::Hs256, true)]
    #[case::hs256_on_eddsa("HS256", KeyAlgorithm::EdDsa, false)]
    #[case::eddsa_on_hs256("EdDSA", KeyAlgorithm::Hs256, false)]
    #[case::rs256("RS256", KeyAlgorithm::EdDsa, false)]
    #[case::hs512("HS512", KeyAlgorithm::Hs256, false)]
    #[case::none_lower("none", KeyAlgorithm::EdDsa, false)]
    #[case::none_upper("NONE", KeyAlgorithm::Hs256, false)]
    #[case::case_variant("eddsa", KeyAlgorithm::EdDsa, false)]
    fn test_validate_algorithm(
        #[case] alg: &str,
        #[case] expected: KeyAlgorithm,
        #[case] accepted: bool,
    ) {
        let result = validate_algorithm(alg, expected);
        assert_eq!(result.is_ok(), accepted, "{alg} against {expected}");
        if let Err(err) = result {
            assert!(
                matches!(err, AuthError::AlgorithmMismatch { ref found, .. } if found == alg)
            );
        }
    }

    #[test]
    fn test_read_algorithm_handles_none() {
        let token = craft_raw_jwt(&json!({"alg": "none", "typ": "JWT"}), &json!({"sub": "x"}));
        assert_eq!(read_algorithm(&token).unwrap(), "none");
    }

    #[rstest]
    #[case::two_parts("aaa.bbb")]
    #[case::four_parts("a.b.c.d")]
    #[case::bad_base64("!!!.e30.")]
    #[case::not_json("bm90LWpzb24.e30.")]
    #[case::missing_alg("eyJ0eXAiOiJKV1QifQ.e30.")]
    fn test_read_algorithm_malformed(#[case] token: &str) {
        assert!(matches!(read_algorithm(token), Err(AuthError::MalformedToken(_))));
    }

    #[test]
    fn test_read_expiry() {
        let token = craft_raw_jwt(&json!({"alg": "EdDSA"}), &json!({"sub": "x", "exp": 1_700_000_000}));
        assert_eq!(read_expiry(&token), Some(1_700_000_000));

        let token = craft_raw_jwt(&json!({"alg": "EdDSA"}), &json!({"sub": "x"}));
        assert_eq!(read_expiry(&token), None);
        assert_eq!(read_expiry("opaque-token"), None);
        assert_eq!(read_expiry("a.!!!.c"), None);
    }
}
