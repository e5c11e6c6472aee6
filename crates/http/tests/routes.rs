//! End-to-end tests of the gateway router over in-memory collaborators.
#![allow(clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use axum::{
    Extension, Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::AUTHORIZATION},
    response::Response,
    routing::get,
};
use ordergate_authn::{
    BcryptHasher, ExpiringCache, Identity,
    testutil::{basic_payload, ed25519_codec},
};
use ordergate_http::{AppState, UNAUTHORIZED_BODY, router};
use ordergate_storage::MemoryCredentialStore;
use rstest::rstest;
use tower::ServiceExt;

struct Harness {
    app: Router,
    store: Arc<MemoryCredentialStore>,
    cache: Arc<ExpiringCache>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryCredentialStore::new());
    let cache = Arc::new(ExpiringCache::new(Duration::from_secs(600), 100));
    let state =
        AppState::with_store(Arc::clone(&store), BcryptHasher::new(4), ed25519_codec(), Arc::clone(&cache));

    let protected = Router::new().route(
        "/whoami",
        get(|Extension(identity): Extension<Arc<Identity>>| async move {
            identity.subject().to_owned()
        }),
    );

    Harness { app: router(state, protected), store, cache }
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.expect("infallible")
    }

    async fn signup(&self, body: &str) -> StatusCode {
        let request = Request::post("/auth/signup")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request");
        self.send(request).await.status()
    }

    async fn call(&self, method: &str, uri: &str, authorization: Option<&str>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", basic_payload(username, password))
}

#[tokio::test]
async fn signup_then_basic_login_reaches_protected_route() {
    let h = harness();
    assert_eq!(h.signup(r#"{"username":"alice","password":"pw"}"#).await, StatusCode::CREATED);
    assert_eq!(h.store.len(), 1);

    let response = h.call("GET", "/whoami", Some(&basic("alice", "pw"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "alice");
    assert_eq!(h.cache.len(), 1);
}

#[rstest]
#[case::missing(None)]
#[case::wrong_password(Some("Basic YWxpY2U6bm9wZQ=="))]
#[case::unknown_user(Some("Basic Ym9iOnB3"))]
#[case::bad_base64(Some("Basic !!!"))]
#[case::unsupported_scheme(Some("Digest abc"))]
#[case::garbage_token(Some("Bearer not-a-token"))]
#[case::no_credential(Some("Basic"))]
#[tokio::test]
async fn every_failure_is_the_same_401(#[case] authorization: Option<&str>) {
    let h = harness();
    assert_eq!(h.signup(r#"{"username":"alice","password":"pw"}"#).await, StatusCode::CREATED);

    let response = h.call("GET", "/whoami", authorization).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, UNAUTHORIZED_BODY);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn store_outage_is_401_not_5xx() {
    let h = harness();
    assert_eq!(h.signup(r#"{"username":"alice","password":"pw"}"#).await, StatusCode::CREATED);
    h.store.set_unavailable(true);

    let response = h.call("GET", "/whoami", Some(&basic("alice", "pw"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, UNAUTHORIZED_BODY);
}

#[tokio::test]
async fn issued_token_authenticates_and_is_precached() {
    let h = harness();
    assert_eq!(h.signup(r#"{"username":"alice","password":"pw"}"#).await, StatusCode::CREATED);

    let response = h.call("POST", "/auth/token", Some(&basic("alice", "pw"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"].to_str().expect("ascii").starts_with("text/plain")
    );
    let token = body_text(response).await;
    assert_eq!(token.matches('.').count(), 2);

    // Basic decision plus the appended token.
    assert_eq!(h.cache.len(), 2);

    let response = h.call("GET", "/whoami", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "alice");
}

#[tokio::test]
async fn token_route_requires_authentication() {
    let h = harness();
    let response = h.call("POST", "/auth/token", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_drops_cached_decision() {
    let h = harness();
    assert_eq!(h.signup(r#"{"username":"alice","password":"pw"}"#).await, StatusCode::CREATED);
    let credentials = basic("alice", "pw");

    let response = h.call("GET", "/whoami", Some(&credentials)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.cache.len(), 1);

    // The middleware re-caches the decision before the handler revokes it.
    let response = h.call("POST", "/auth/logout", Some(&credentials)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(h.cache.is_empty());

    // Revocation forces re-verification, which fails once the store is down.
    h.store.set_unavailable(true);
    let response = h.call("GET", "/whoami", Some(&credentials)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[case::not_json("username=alice", StatusCode::BAD_REQUEST)]
#[case::missing_field(r#"{"username":"alice"}"#, StatusCode::BAD_REQUEST)]
#[case::empty_password(r#"{"username":"alice","password":""}"#, StatusCode::BAD_REQUEST)]
#[case::empty_username(r#"{"username":"","password":"pw"}"#, StatusCode::BAD_REQUEST)]
#[tokio::test]
async fn signup_rejects_bad_bodies(#[case] body: &str, #[case] expected: StatusCode) {
    let h = harness();
    assert_eq!(h.signup(body).await, expected);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn signup_conflict_and_outage() {
    let h = harness();
    let body = r#"{"username":"alice","password":"pw"}"#;

    assert_eq!(h.signup(body).await, StatusCode::CREATED);
    assert_eq!(h.signup(body).await, StatusCode::CONFLICT);

    h.store.set_unavailable(true);
    assert_eq!(h.signup(r#"{"username":"bob","password":"pw"}"#).await, StatusCode::SERVICE_UNAVAILABLE);
}
