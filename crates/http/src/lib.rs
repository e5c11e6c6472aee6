//! # ordergate HTTP glue
//!
//! Axum wiring for the authentication core: a middleware that turns every
//! authentication failure into the same 401, plus the token, signup and
//! logout routes. The business routes it protects are supplied by the host.
//!
//! ```text
//! request ─▶ require_auth ──401──▶ "Unauthorized"
//!                 │
//!         Arc<Identity> in extensions
//!                 ▼
//!        /auth/token, /auth/logout, host routes
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{Router, routing::get};
//! use ordergate_authn::{
//!     BcryptHasher, ExpiringCache, SigningKey, TokenCodec, config::AuthConfig,
//! };
//! use ordergate_http::{AppState, router};
//! use ordergate_storage::MemoryCredentialStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::default();
//! let key = Arc::new(SigningKey::load(&config.signing_key)?);
//! let state = AppState::with_store(
//!     Arc::new(MemoryCredentialStore::new()),
//!     BcryptHasher::default(),
//!     TokenCodec::new(key, config.token.clone()),
//!     ExpiringCache::from_config(&config.cache),
//! );
//!
//! let orders = Router::new().route("/order/show", get(|| async { "[]" }));
//! let app = router(state, orders);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{Router, middleware::from_fn_with_state, routing::post};
pub use middleware::{UNAUTHORIZED_BODY, require_auth};
pub use state::AppState;

/// Assembles the gateway router.
///
/// `POST /auth/signup` is public. `POST /auth/token`, `POST /auth/logout`
/// and every route of `protected` sit behind [`require_auth`].
pub fn router(state: AppState, protected: Router) -> Router {
    let authenticated = Router::new()
        .route("/auth/token", post(handlers::issue_token))
        .route("/auth/logout", post(handlers::logout))
        .with_state(state.clone())
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/auth/signup", post(handlers::signup))
        .with_state(state)
        .merge(authenticated)
}
