//! # ordergate authentication gateway
//!
//! Resolves the `Authorization` header of an inbound request to an
//! authenticated [`Identity`], issues signed tokens, and caches successful
//! decisions so that password hashing and signature checks are not repeated
//! for every request carrying the same credential.
//!
//! ## Components
//!
//! - **[`Authenticator`]**: picks a [`Strategy`] by scheme (case-insensitive)
//! - **[`BasicStrategy`] / [`CachedBearerStrategy`]**: parse, consult the
//!   cache, verify on miss, cache on success
//! - **[`ExpiringCache`]**: bounded FIFO cache with absolute TTL, shared by
//!   the strategies
//! - **[`TokenCodec`]**: JWT issue/verify, pinned to one algorithm
//! - **[`SigningKey`]**: key material loaded once at startup
//! - **[`PasswordVerifier`] / [`TokenVerifier`]**: the verification callbacks
//!   the host supplies; [`StoredPasswordVerifier`] covers the common case
//!
//! Every failure is an [`AuthError`]; callers must answer all of them with the
//! same 401. Nothing that fails is cached.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ordergate_authn::{
//!     Authenticator, BasicStrategy, BcryptHasher, CachedBearerStrategy, ExpiringCache,
//!     RequestContext, SigningKey, StoredPasswordVerifier, TokenCodec, config::AuthConfig,
//! };
//! use ordergate_storage::MemoryCredentialStore;
//!
//! # async fn example(headers: http::HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::default();
//! let key = Arc::new(SigningKey::load(&config.signing_key)?);
//! let codec = TokenCodec::new(key, config.token.clone());
//! let cache = ExpiringCache::from_config(&config.cache);
//!
//! let store = Arc::new(MemoryCredentialStore::new());
//! let passwords = StoredPasswordVerifier::new(store, BcryptHasher::default());
//!
//! let authenticator = Authenticator::new()
//!     .with_strategy(Arc::new(BasicStrategy::new(passwords, Arc::clone(&cache))))
//!     .with_strategy(Arc::new(CachedBearerStrategy::new(codec, cache)));
//!
//! let identity = authenticator.authenticate(&RequestContext::new(), &headers).await?;
//! println!("authenticated {}", identity.subject());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod header;
pub mod identity;
pub mod jwt;
pub mod metrics;
pub mod password;
pub mod signing_key;
pub mod strategy;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod validation;
pub mod verifier;

// Re-export key types for convenience
pub use authenticator::Authenticator;
pub use cache::ExpiringCache;
pub use context::RequestContext;
pub use error::{AuthError, KeyError, Result};
pub use header::credential_fingerprint;
pub use identity::{ClaimValue, Identity};
pub use jwt::{TokenClaims, TokenCodec};
pub use metrics::CacheMetricsSnapshot;
pub use password::{BcryptHasher, PasswordHasher};
pub use signing_key::{KeyAlgorithm, KeySource, SigningKey};
pub use strategy::{BasicStrategy, CachedBearerStrategy, Strategy};
pub use validation::{FORBIDDEN_ALGORITHMS, validate_algorithm};
pub use verifier::{PasswordVerifier, StoredPasswordVerifier, TokenVerifier};
