//! Fuzz target for credential parsing and token verification.
//!
//! Feeds arbitrary strings through the `Authorization` header parser, the
//! Basic payload decoder, the JWT algorithm reader and full token
//! verification. Every result must be `Ok(...)` or `Err(AuthError)`.

#![no_main]

use std::sync::{Arc, LazyLock};

use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use libfuzzer_sys::fuzz_target;
use ordergate_authn::{
    KeyAlgorithm, SigningKey, TokenCodec,
    config::TokenConfig,
    header::{decode_basic, parse_authorization},
    validate_algorithm,
    validation::read_algorithm,
};

static CODEC: LazyLock<Option<TokenCodec>> = LazyLock::new(|| {
    let key = SigningKey::from_hmac_secret(b"fuzzing-only-secret-fuzzing-only-secret").ok()?;
    Some(TokenCodec::new(Arc::new(key), TokenConfig::default()))
});

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(value) = HeaderValue::from_str(input) {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        if let Ok(header) = parse_authorization(&headers) {
            let _ = decode_basic(header.credential);
        }
    }

    let _ = decode_basic(input);

    if let Ok(alg) = read_algorithm(input) {
        let _ = validate_algorithm(&alg, KeyAlgorithm::Hs256);
    }

    if let Some(codec) = CODEC.as_ref() {
        let _ = codec.verify(input);
    }
});
