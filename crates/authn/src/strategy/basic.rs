//! `Basic` username/password strategy.

use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;

use super::{Strategy, parse_for_scheme, resolve, revoke_cached};
use crate::{
    cache::{ExpiringCache, scoped_key},
    context::RequestContext,
    error::Result,
    header::decode_basic,
    identity::Identity,
    verifier::PasswordVerifier,
};

const SCHEME: &str = "Basic";

/// Resolves `Authorization: Basic base64(username:password)` through a
/// [`PasswordVerifier`], caching successes under the raw base64 payload.
pub struct BasicStrategy<V> {
    verifier: V,
    cache: Arc<ExpiringCache>,
}

impl<V: PasswordVerifier> BasicStrategy<V> {
    /// Creates the strategy over a shared cache.
    pub fn new(verifier: V, cache: Arc<ExpiringCache>) -> Self {
        Self { verifier, cache }
    }

    /// The password verifier.
    pub fn verifier(&self) -> &V {
        &self.verifier
    }
}

#[async_trait]
impl<V: PasswordVerifier> Strategy for BasicStrategy<V> {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    #[tracing::instrument(skip_all, fields(scheme = SCHEME))]
    async fn authenticate(&self, ctx: &RequestContext, headers: &HeaderMap) -> Result<Arc<Identity>> {
        let header = parse_for_scheme(headers, SCHEME)?;
        let credentials = decode_basic(header.credential)?;

        resolve(
            &self.cache,
            SCHEME,
            header.credential,
            ctx,
            |_| true,
            self.verifier.verify_password(ctx, &credentials.username, &credentials.password),
        )
        .await
    }

    fn append(&self, credential: &str, identity: Arc<Identity>) {
        self.cache.store(scoped_key(SCHEME, credential), identity);
    }

    fn revoke(&self, credential: &str) -> bool {
        revoke_cached(&self.cache, SCHEME, credential)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        error::AuthError,
        testutil::{CountingPasswordVerifier, basic_headers, headers_with},
    };

    fn strategy() -> BasicStrategy<Arc<CountingPasswordVerifier>> {
        let verifier = Arc::new(CountingPasswordVerifier::new().with_user("alice", "pw"));
        BasicStrategy::new(verifier, Arc::new(ExpiringCache::new(Duration::from_secs(600), 100)))
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let strategy = strategy();
        let ctx = RequestContext::new();
        let headers = basic_headers("alice", "pw");

        let first = strategy.authenticate(&ctx, &headers).await.unwrap();
        let second = strategy.authenticate(&ctx, &headers).await.unwrap();

        assert_eq!(first.subject(), "alice");
        assert_eq!(first, second);
        assert_eq!(strategy.verifier().calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let strategy = strategy();
        let ctx = RequestContext::new();
        let headers = basic_headers("alice", "wrong");

        for _ in 0..2 {
            let err = strategy.authenticate(&ctx, &headers).await.unwrap_err();
            assert!(matches!(err, AuthError::PasswordMismatch));
        }
        assert_eq!(strategy.verifier().calls(), 2);
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_malformed() {
        let strategy = strategy();
        let err = strategy
            .authenticate(&RequestContext::new(), &headers_with("Bearer abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedCredential(_)));
        assert_eq!(strategy.verifier().calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_base64_never_reaches_verifier() {
        let strategy = strategy();
        let err = strategy
            .authenticate(&RequestContext::new(), &headers_with("Basic %%%"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedCredential(_)));
        assert_eq!(strategy.verifier().calls(), 0);
    }

    #[tokio::test]
    async fn test_append_and_revoke() {
        let strategy = strategy();
        let ctx = RequestContext::new();
        let headers = basic_headers("alice", "pw");
        let payload = headers
            .get(http::header::AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .trim_start_matches("Basic ")
            .to_owned();

        strategy.append(&payload, Arc::new(Identity::new("alice").with_id("pre")));
        let hit = strategy.authenticate(&ctx, &headers).await.unwrap();
        assert_eq!(hit.id(), Some("pre"));
        assert_eq!(strategy.verifier().calls(), 0);

        assert!(strategy.revoke(&payload));
        strategy.authenticate(&ctx, &headers).await.unwrap();
        assert_eq!(strategy.verifier().calls(), 1);
    }
}
