//! End-to-end behaviour of the authenticator, strategies and shared cache.
//!
//! Verifier invocation counts are the observable: a cache hit performs zero
//! verifications, a miss performs exactly one.
#![allow(clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use ordergate_authn::{
    AuthError, Authenticator, BasicStrategy, CachedBearerStrategy, ExpiringCache, Identity,
    RequestContext, Strategy,
    testutil::{
        CountingPasswordVerifier, CountingTokenVerifier, basic_headers, basic_payload,
        bearer_headers, ed25519_codec, headers_with,
    },
};

const CACHE_TTL: Duration = Duration::from_secs(600);

struct Harness {
    authenticator: Authenticator,
    cache: Arc<ExpiringCache>,
    basic: Arc<BasicStrategy<Arc<CountingPasswordVerifier>>>,
    bearer: Arc<CachedBearerStrategy<Arc<CountingTokenVerifier>>>,
    passwords: Arc<CountingPasswordVerifier>,
    tokens: Arc<CountingTokenVerifier>,
}

fn harness_with(capacity: usize, passwords: CountingPasswordVerifier, tokens: CountingTokenVerifier) -> Harness {
    let cache = Arc::new(ExpiringCache::new(CACHE_TTL, capacity));
    let passwords = Arc::new(passwords);
    let tokens = Arc::new(tokens);

    let basic = Arc::new(BasicStrategy::new(Arc::clone(&passwords), Arc::clone(&cache)));
    let bearer = Arc::new(CachedBearerStrategy::new(Arc::clone(&tokens), Arc::clone(&cache)));

    let authenticator = Authenticator::new()
        .with_strategy(Arc::clone(&basic) as Arc<dyn Strategy>)
        .with_strategy(Arc::clone(&bearer) as Arc<dyn Strategy>);

    Harness { authenticator, cache, basic, bearer, passwords, tokens }
}

fn harness() -> Harness {
    harness_with(
        1_000,
        CountingPasswordVerifier::new().with_user("alice", "wonderland").with_user("bob", "builder"),
        CountingTokenVerifier::new(ed25519_codec()),
    )
}

// ---------------------------------------------------------------------------
// Caching
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn basic_second_call_within_ttl_skips_verifier() {
    let h = harness();
    let ctx = RequestContext::new();
    let headers = basic_headers("alice", "wonderland");

    let first = h.authenticator.authenticate(&ctx, &headers).await.expect("first");
    assert_eq!(first.subject(), "alice");
    assert_eq!(h.passwords.calls(), 1);

    let second = h.authenticator.authenticate(&ctx, &headers).await.expect("second");
    assert_eq!(h.passwords.calls(), 1);
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn cache_expiry_forces_reverification() {
    let h = harness();
    let ctx = RequestContext::new();
    let headers = basic_headers("alice", "wonderland");

    h.authenticator.authenticate(&ctx, &headers).await.expect("first");
    tokio::time::advance(CACHE_TTL - Duration::from_secs(1)).await;
    h.authenticator.authenticate(&ctx, &headers).await.expect("within ttl");
    assert_eq!(h.passwords.calls(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    h.authenticator.authenticate(&ctx, &headers).await.expect("after ttl");
    assert_eq!(h.passwords.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn revoke_forces_reverification() {
    let h = harness();
    let ctx = RequestContext::new();
    let headers = basic_headers("alice", "wonderland");

    h.authenticator.authenticate(&ctx, &headers).await.expect("first");
    assert!(h.basic.revoke(&basic_payload("alice", "wonderland")));

    h.authenticator.authenticate(&ctx, &headers).await.expect("after revoke");
    assert_eq!(h.passwords.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failures_are_never_cached() {
    let h = harness();
    let ctx = RequestContext::new();

    for (username, password, expected) in [
        ("alice", "wrong", "password_mismatch"),
        ("carol", "whatever", "unknown_user"),
        ("", "pw", "empty_username"),
        ("alice", "", "empty_password"),
    ] {
        let headers = basic_headers(username, password);
        for _ in 0..2 {
            let err = h.authenticator.authenticate(&ctx, &headers).await.expect_err("must fail");
            assert_eq!(err.kind(), expected);
        }
    }

    assert_eq!(h.passwords.calls(), 8);
    assert!(h.cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn store_outage_is_retryable_and_not_cached() {
    let h = harness();
    let ctx = RequestContext::new();
    let headers = basic_headers("alice", "wonderland");

    h.passwords.set_unavailable(true);
    let err = h.authenticator.authenticate(&ctx, &headers).await.expect_err("outage");
    assert!(matches!(err, AuthError::StoreUnavailable(_)));
    assert!(err.is_retryable());

    h.passwords.set_unavailable(false);
    h.authenticator.authenticate(&ctx, &headers).await.expect("recovered");
    assert_eq!(h.passwords.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn fifo_eviction_under_capacity_pressure() {
    let h = harness_with(
        2,
        CountingPasswordVerifier::new()
            .with_user("alice", "a")
            .with_user("bob", "b")
            .with_user("carol", "c"),
        CountingTokenVerifier::new(ed25519_codec()),
    );
    let ctx = RequestContext::new();
    let alice = basic_headers("alice", "a");

    h.authenticator.authenticate(&ctx, &alice).await.expect("alice");
    h.authenticator.authenticate(&ctx, &basic_headers("bob", "b")).await.expect("bob");
    // Frequent reads do not protect alice
    for _ in 0..5 {
        h.authenticator.authenticate(&ctx, &alice).await.expect("alice hit");
    }
    assert_eq!(h.passwords.calls(), 2);

    h.authenticator.authenticate(&ctx, &basic_headers("carol", "c")).await.expect("carol");
    assert_eq!(h.passwords.calls(), 3);

    h.authenticator.authenticate(&ctx, &alice).await.expect("alice again");
    assert_eq!(h.passwords.calls(), 4, "alice was the oldest insertion and must be evicted");
}

// ---------------------------------------------------------------------------
// Bearer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bearer_token_cached_after_first_verification() {
    let h = harness();
    let ctx = RequestContext::new();
    let token = h.tokens.codec().issue("alice", Duration::from_secs(300)).expect("issue");

    for _ in 0..3 {
        let identity =
            h.authenticator.authenticate(&ctx, &bearer_headers(&token)).await.expect("valid");
        assert_eq!(identity.subject(), "alice");
    }
    assert_eq!(h.tokens.calls(), 1);
}

#[tokio::test]
async fn bearer_expired_token_fails_and_writes_nothing() {
    let h = harness();
    let ctx = RequestContext::new();
    let token = h
        .tokens
        .codec()
        .issue_at("alice", Utc::now() - chrono::Duration::minutes(10), Duration::from_secs(300))
        .expect("issue");

    let err = h.authenticator.authenticate(&ctx, &bearer_headers(&token)).await.expect_err("expired");
    assert!(matches!(err, AuthError::TokenExpired));
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn append_prepopulates_bearer_cache() {
    let h = harness();
    let ctx = RequestContext::new();
    let token = h.tokens.codec().issue("alice", Duration::from_secs(300)).expect("issue");

    h.bearer.append(&token, Arc::new(Identity::new("alice")));
    h.authenticator.authenticate(&ctx, &bearer_headers(&token)).await.expect("cached");
    assert_eq!(h.tokens.calls(), 0);

    assert!(h.authenticator.revoke(&bearer_headers(&token)).expect("revoke"));
    h.authenticator.authenticate(&ctx, &bearer_headers(&token)).await.expect("reverified");
    assert_eq!(h.tokens.calls(), 1);
}

#[tokio::test]
async fn appended_token_stops_authenticating_at_exp() {
    let h = harness();
    let ctx = RequestContext::new();
    // Issued six minutes ago with a five minute lifetime; the cache TTL is ten minutes
    let token = h
        .tokens
        .codec()
        .issue_at("alice", Utc::now() - chrono::Duration::minutes(6), Duration::from_secs(300))
        .expect("issue");

    h.bearer.append(&token, Arc::new(Identity::new("alice")));
    assert_eq!(h.cache.len(), 1);

    let err = h.authenticator.authenticate(&ctx, &bearer_headers(&token)).await.expect_err("expired");
    assert!(matches!(err, AuthError::TokenExpired));
    assert_eq!(h.tokens.calls(), 1);
    assert!(h.cache.is_empty());

    let err = h.authenticator.authenticate(&ctx, &bearer_headers(&token)).await.expect_err("still expired");
    assert!(matches!(err, AuthError::TokenExpired));
    assert_eq!(h.tokens.calls(), 2);
}

#[tokio::test]
async fn schemes_do_not_share_cache_entries() {
    let h = harness();
    let ctx = RequestContext::new();
    let payload = basic_payload("alice", "wonderland");

    h.authenticator.authenticate(&ctx, &basic_headers("alice", "wonderland")).await.expect("basic");

    // The same raw string presented as a bearer token must not hit the Basic entry
    let err = h
        .authenticator
        .authenticate(&ctx, &bearer_headers(&payload))
        .await
        .expect_err("not a JWT");
    assert!(matches!(err, AuthError::MalformedToken(_)));
    assert_eq!(h.tokens.calls(), 1);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn digest_scheme_is_unsupported() {
    let h = harness();
    let err = h
        .authenticator
        .authenticate(&RequestContext::new(), &headers_with("Digest abc"))
        .await
        .expect_err("unsupported");

    assert!(matches!(err, AuthError::UnsupportedScheme(ref scheme) if scheme == "Digest"));
    assert_eq!(h.passwords.calls() + h.tokens.calls(), 0);
}

#[tokio::test]
async fn scheme_match_is_case_insensitive() {
    let h = harness();
    let headers = headers_with(&format!("bAsIc {}", basic_payload("bob", "builder")));

    let identity =
        h.authenticator.authenticate(&RequestContext::new(), &headers).await.expect("valid");
    assert_eq!(identity.subject(), "bob");
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancelled_request_writes_no_cache_entry() {
    let h = harness_with(
        10,
        CountingPasswordVerifier::new().with_user("alice", "pw").with_delay(Duration::from_secs(5)),
        CountingTokenVerifier::new(ed25519_codec()),
    );
    let ctx = RequestContext::new();
    let headers = basic_headers("alice", "pw");

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let err = h.authenticator.authenticate(&ctx, &headers).await.expect_err("cancelled");
    assert!(matches!(err, AuthError::Cancelled));
    assert_eq!(h.passwords.calls(), 1);
    assert!(h.cache.is_empty());

    // A fresh request verifies again
    h.authenticator.authenticate(&RequestContext::new(), &headers).await.expect("fresh");
    assert_eq!(h.passwords.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn deadline_aborts_slow_verification() {
    let h = harness_with(
        10,
        CountingPasswordVerifier::new(),
        CountingTokenVerifier::new(ed25519_codec()).with_delay(Duration::from_secs(30)),
    );
    let token = h.tokens.codec().issue("alice", Duration::from_secs(300)).expect("issue");
    let ctx = RequestContext::new().with_timeout(Duration::from_secs(2));

    let err = h.authenticator.authenticate(&ctx, &bearer_headers(&token)).await.expect_err("deadline");
    assert!(matches!(err, AuthError::Cancelled));
    assert!(h.cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn revoke_during_verification_is_not_undone() {
    let h = harness_with(
        10,
        CountingPasswordVerifier::new().with_user("alice", "pw").with_delay(Duration::from_secs(5)),
        CountingTokenVerifier::new(ed25519_codec()),
    );
    let headers = basic_headers("alice", "pw");
    let payload = basic_payload("alice", "pw");

    let basic = Arc::clone(&h.basic);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        basic.revoke(&payload);
    });

    h.authenticator.authenticate(&RequestContext::new(), &headers).await.expect("verified");
    assert!(h.cache.is_empty(), "a verification in flight at revoke time must not be cached");
}

#[tokio::test]
async fn concurrent_requests_converge_on_one_entry() {
    let h = harness();
    let authenticator = Arc::new(h.authenticator.clone());
    let mut handles = Vec::new();

    for _ in 0..16 {
        let authenticator = Arc::clone(&authenticator);
        handles.push(tokio::spawn(async move {
            authenticator
                .authenticate(&RequestContext::new(), &basic_headers("alice", "wonderland"))
                .await
                .map(|identity| identity.subject().to_owned())
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.expect("join").expect("auth"), "alice");
    }
    assert_eq!(h.cache.len(), 1);
    assert!(h.passwords.calls() >= 1);
}
