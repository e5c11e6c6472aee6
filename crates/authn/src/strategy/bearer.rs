//! `Bearer` token strategy.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use http::HeaderMap;

use super::{Strategy, parse_for_scheme, resolve, revoke_cached};
use crate::{
    cache::{ExpiringCache, scoped_key},
    context::RequestContext,
    error::Result,
    identity::{ClaimValue, Identity},
    validation::read_expiry,
    verifier::TokenVerifier,
};

const SCHEME: &str = "Bearer";

/// Resolves `Authorization: Bearer <token>` through a [`TokenVerifier`],
/// caching successes under the token string.
///
/// A cached decision is served only while the token's own `exp` lies in the
/// future. The expiry is read from the token payload, falling back to the
/// identity's `exp` extension for opaque tokens. Once it has passed the
/// entry is dropped and the verifier reports the expiry.
pub struct CachedBearerStrategy<V> {
    verifier: V,
    cache: Arc<ExpiringCache>,
}

impl<V: TokenVerifier> CachedBearerStrategy<V> {
    /// Creates the strategy over a shared cache.
    pub fn new(verifier: V, cache: Arc<ExpiringCache>) -> Self {
        Self { verifier, cache }
    }

    /// The token verifier.
    pub fn verifier(&self) -> &V {
        &self.verifier
    }
}

#[async_trait]
impl<V: TokenVerifier> Strategy for CachedBearerStrategy<V> {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    #[tracing::instrument(skip_all, fields(scheme = SCHEME))]
    async fn authenticate(&self, ctx: &RequestContext, headers: &HeaderMap) -> Result<Arc<Identity>> {
        let header = parse_for_scheme(headers, SCHEME)?;
        let token = header.credential;

        let still_valid = |identity: &Identity| !token_expired(token, identity, Utc::now().timestamp());
        resolve(&self.cache, SCHEME, token, ctx, still_valid, self.verifier.verify_token(ctx, token))
            .await
    }

    fn append(&self, credential: &str, identity: Arc<Identity>) {
        self.cache.store(scoped_key(SCHEME, credential), identity);
    }

    fn revoke(&self, credential: &str) -> bool {
        revoke_cached(&self.cache, SCHEME, credential)
    }
}

/// `true` once `token` has reached its expiry at `now` (seconds since epoch).
///
/// Tokens with no readable expiry never expire here; the cache TTL bounds them.
fn token_expired(token: &str, identity: &Identity, now: i64) -> bool {
    read_expiry(token)
        .or_else(|| identity.extension("exp").and_then(ClaimValue::as_i64))
        .is_some_and(|exp| exp <= now)
}
