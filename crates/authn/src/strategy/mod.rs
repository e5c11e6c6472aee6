//! Authentication strategies.
//!
//! One strategy per `Authorization` scheme. Each one parses its credential,
//! consults the shared [`ExpiringCache`], and only on a miss calls its
//! verifier. Successful results are cached under the scheme-scoped raw
//! credential; failures never are. A cached decision whose credential has
//! itself expired counts as a miss.
//!
//! ```text
//! headers ─▶ parse ─▶ cache.load ──hit──▶ Arc<Identity>
//!                        │     └─hit, credential expired─▶ cache.expire
//!                       miss                                   │
//!                        ▼◀────────────────────────────────────┘
//!              ctx.run(verifier) ──err──▶ AuthError (not cached)
//!                        │
//!                        ok
//!                        ▼
//!                  cache.store ─▶ Arc<Identity>
//! ```

mod basic;
mod bearer;

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
pub use basic::BasicStrategy;
pub use bearer::CachedBearerStrategy;
use http::HeaderMap;

use crate::{
    cache::{ExpiringCache, scoped_key},
    context::RequestContext,
    error::{AuthError, Result},
    header::{AuthorizationHeader, credential_fingerprint, parse_authorization},
    identity::Identity,
};

/// A credential-resolution strategy for one scheme.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// The scheme this strategy handles, e.g. `Basic`.
    fn scheme(&self) -> &'static str;

    /// Resolves the request's credential to an identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedCredential`] if the header does not
    /// carry this strategy's scheme or cannot be parsed, and otherwise
    /// whatever the verifier reports.
    async fn authenticate(&self, ctx: &RequestContext, headers: &HeaderMap) -> Result<Arc<Identity>>;

    /// Caches `identity` for `credential` without verification.
    fn append(&self, credential: &str, identity: Arc<Identity>);

    /// Drops any cached decision for `credential`, forcing re-verification.
    ///
    /// Returns `true` if an entry was removed.
    fn revoke(&self, credential: &str) -> bool;
}

/// Parses the header and checks that it carries `scheme`.
fn parse_for_scheme<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<AuthorizationHeader<'a>> {
    let header = parse_authorization(headers)?;
    if !header.scheme.eq_ignore_ascii_case(scheme) {
        return Err(AuthError::malformed_credential(format!(
            "expected {scheme} credentials, found {}",
            header.scheme
        )));
    }
    Ok(header)
}

/// Cache lookup, verification on miss, and cache population on success.
///
/// A hit is only served if `still_valid` accepts it; otherwise the entry is
/// expired and the credential verified again.
async fn resolve<P, F>(
    cache: &ExpiringCache,
    scheme: &'static str,
    credential: &str,
    ctx: &RequestContext,
    still_valid: P,
    verify: F,
) -> Result<Arc<Identity>>
where
    P: Fn(&Identity) -> bool + Send,
    F: Future<Output = Result<Identity>> + Send,
{
    let key = scoped_key(scheme, credential);
    let fingerprint = credential_fingerprint(credential);

    match cache.load(&key) {
        Some(identity) if still_valid(&identity) => {
            tracing::debug!(scheme, credential = %fingerprint, "Cache hit");
            return Ok(identity);
        },
        Some(_) => {
            cache.expire(&key);
            tracing::debug!(scheme, credential = %fingerprint, "Cached credential has expired");
        },
        None => tracing::debug!(scheme, credential = %fingerprint, "Cache miss"),
    }

    let revision = cache.revision();
    let identity = match ctx.run(verify).await {
        Ok(identity) => Arc::new(identity),
        Err(e) => {
            tracing::warn!(
                scheme,
                credential = %fingerprint,
                error.kind = e.kind(),
                retryable = e.is_retryable(),
                "Credential verification failed"
            );
            return Err(e);
        },
    };

    if !cache.store_unless_revoked(key, Arc::clone(&identity), revision) {
        tracing::debug!(scheme, credential = %fingerprint, "Revoked during verification; not cached");
    }

    Ok(identity)
}

fn revoke_cached(cache: &ExpiringCache, scheme: &'static str, credential: &str) -> bool {
    let removed = cache.delete(&scoped_key(scheme, credential));
    tracing::info!(
        audit.action = "revoke",
        audit.resource = %credential_fingerprint(credential),
        audit.result = if removed { "removed" } else { "absent" },
        scheme,
        "audit_event"
    );
    removed
}
