//! Scheme dispatch.
//!
//! The [`Authenticator`] is the single entry point request middleware calls.
//! It reads the scheme token of the `Authorization` header, picks the
//! registered [`Strategy`] (case-insensitively), and hands the request over.
//! It never touches the cache or a verifier itself.

use std::{collections::HashMap, fmt, sync::Arc};

use http::HeaderMap;

use crate::{
    context::RequestContext,
    error::{AuthError, Result},
    header::parse_authorization,
    identity::Identity,
    strategy::Strategy,
};

/// Registry of strategies keyed by scheme.
///
/// # Example
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use ordergate_authn::{
///     Authenticator, CachedBearerStrategy, ExpiringCache, SigningKey, TokenCodec,
///     config::TokenConfig,
/// };
///
/// let key = SigningKey::from_hmac_secret(b"an-example-secret-of-at-least-32-bytes").unwrap();
/// let codec = TokenCodec::new(Arc::new(key), TokenConfig::default());
/// let cache = Arc::new(ExpiringCache::new(Duration::from_secs(600), 1_000));
///
/// let authenticator =
///     Authenticator::new().with_strategy(Arc::new(CachedBearerStrategy::new(codec, cache)));
///
/// assert!(authenticator.strategy("BEARER").is_some());
/// assert!(authenticator.strategy("Basic").is_none());
/// ```
#[derive(Clone, Default)]
pub struct Authenticator {
    strategies: HashMap<String, Arc<dyn Strategy>>,
}

impl Authenticator {
    /// Creates an authenticator with no strategies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `strategy`, replacing any strategy for the same scheme.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.enable_strategy(strategy);
        self
    }

    /// Registers `strategy` and returns the one it replaced, if any.
    pub fn enable_strategy(&mut self, strategy: Arc<dyn Strategy>) -> Option<Arc<dyn Strategy>> {
        self.strategies.insert(strategy.scheme().to_ascii_lowercase(), strategy)
    }

    /// Unregisters the strategy for `scheme` and returns it.
    pub fn disable_strategy(&mut self, scheme: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.remove(&scheme.to_ascii_lowercase())
    }

    /// The strategy registered for `scheme`, matched case-insensitively.
    #[must_use]
    pub fn strategy(&self, scheme: &str) -> Option<&Arc<dyn Strategy>> {
        self.strategies.get(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<&'static str> {
        let mut schemes: Vec<_> = self.strategies.values().map(|s| s.scheme()).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Authenticates a request by delegating to the strategy for its scheme.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingCredentials`] without an `Authorization` header
    /// - [`AuthError::MalformedCredential`] if the header cannot be split
    /// - [`AuthError::UnsupportedScheme`] if no strategy handles the scheme
    /// - otherwise, the strategy's error unchanged
    #[tracing::instrument(skip_all, fields(scheme))]
    pub async fn authenticate(&self, ctx: &RequestContext, headers: &HeaderMap) -> Result<Arc<Identity>> {
        let strategy = self.select(headers)?;
        strategy.authenticate(ctx, headers).await
    }

    /// Revokes the cached decision for the request's credential.
    ///
    /// Returns `true` if an entry was removed.
    ///
    /// # Errors
    ///
    /// Same header and scheme errors as [`authenticate`](Self::authenticate).
    pub fn revoke(&self, headers: &HeaderMap) -> Result<bool> {
        let strategy = self.select(headers)?;
        let header = parse_authorization(headers)?;
        Ok(strategy.revoke(header.credential))
    }

    fn select(&self, headers: &HeaderMap) -> Result<&Arc<dyn Strategy>> {
        let header = parse_authorization(headers)?;
        tracing::Span::current().record("scheme", header.scheme);

        self.strategy(header.scheme).ok_or_else(|| {
            tracing::debug!(scheme = header.scheme, "No strategy registered for scheme");
            AuthError::unsupported_scheme(header.scheme)
        })
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator").field("schemes", &self.schemes()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        cache::ExpiringCache,
        strategy::{BasicStrategy, CachedBearerStrategy},
        testutil::{CountingPasswordVerifier, basic_headers, ed25519_codec, headers_with},
    };

    fn authenticator() -> Authenticator {
        let cache = Arc::new(ExpiringCache::new(Duration::from_secs(600), 100));
        let basic = BasicStrategy::new(
            CountingPasswordVerifier::new().with_user("alice", "pw"),
            Arc::clone(&cache),
        );
        let bearer = CachedBearerStrategy::new(ed25519_codec(), cache);

        Authenticator::new().with_strategy(Arc::new(basic)).with_strategy(Arc::new(bearer))
    }

    #[test]
    fn test_registry_is_case_insensitive() {
        let mut auth = authenticator();
        assert_eq!(auth.schemes(), vec!["Basic", "Bearer"]);
        assert!(auth.strategy("basic").is_some());
        assert!(auth.strategy("BEARER").is_some());

        assert!(auth.disable_strategy("BASIC").is_some());
        assert_eq!(auth.schemes(), vec!["Bearer"]);
        assert!(auth.disable_strategy("basic").is_none());
    }

    #[tokio::test]
    async fn test_dispatches_by_scheme() {
        let auth = authenticator();
        let identity =
            auth.authenticate(&RequestContext::new(), &basic_headers("alice", "pw")).await.unwrap();
        assert_eq!(identity.subject(), "alice");
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let auth = authenticator();
        let err = auth
            .authenticate(&RequestContext::new(), &headers_with("Digest abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedScheme(ref s) if s == "Digest"));
    }

    #[tokio::test]
    async fn test_missing_header() {
        let auth = authenticator();
        let err = auth.authenticate(&RequestContext::new(), &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_disabled_scheme_becomes_unsupported() {
        let mut auth = authenticator();
        auth.disable_strategy("Basic");

        let err = auth
            .authenticate(&RequestContext::new(), &basic_headers("alice", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn test_revoke_via_headers() {
        let auth = authenticator();
        let headers = basic_headers("alice", "pw");

        auth.authenticate(&RequestContext::new(), &headers).await.unwrap();
        assert!(auth.revoke(&headers).unwrap());
        assert!(!auth.revoke(&headers).unwrap());
    }
}
