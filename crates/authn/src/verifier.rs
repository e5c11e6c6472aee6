//! Credential verifier contracts.
//!
//! Strategies never look up passwords or check signatures themselves. They
//! call a verifier supplied by the host:
//!
//! - [`PasswordVerifier`] for Basic credentials
//! - [`TokenVerifier`] for Bearer tokens ([`TokenCodec`](crate::TokenCodec)
//!   implements it)
//!
//! A verifier may block on I/O. It receives the request's [`RequestContext`]
//! so it can abandon work when the client goes away; strategies additionally
//! drop the verification future when the context fires.
//!
//! [`StoredPasswordVerifier`] is the stock password verifier over a
//! [`CredentialStore`] and a [`PasswordHasher`].

use std::sync::Arc;

use async_trait::async_trait;
use fail::fail_point;
use ordergate_storage::{CredentialStore, StorageError};
use tokio::sync::OnceCell;

use crate::{
    context::RequestContext,
    error::{AuthError, Result},
    identity::Identity,
    password::PasswordHasher,
};

/// Resolves a username and password to an identity.
///
/// Implementations fail with [`AuthError::EmptyUsername`],
/// [`AuthError::EmptyPassword`], [`AuthError::UnknownUser`],
/// [`AuthError::StoreUnavailable`] or [`AuthError::PasswordMismatch`].
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    /// Verifies `password` for `username`.
    async fn verify_password(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Identity>;
}

/// Resolves a bearer token to an identity.
///
/// Implementations fail with [`AuthError::MalformedToken`],
/// [`AuthError::AlgorithmMismatch`], [`AuthError::SignatureMismatch`] or
/// [`AuthError::TokenExpired`].
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verifies `token`.
    async fn verify_token(&self, ctx: &RequestContext, token: &str) -> Result<Identity>;
}

#[async_trait]
impl<T: PasswordVerifier + ?Sized> PasswordVerifier for Arc<T> {
    async fn verify_password(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Identity> {
        (**self).verify_password(ctx, username, password).await
    }
}

#[async_trait]
impl<T: TokenVerifier + ?Sized> TokenVerifier for Arc<T> {
    async fn verify_token(&self, ctx: &RequestContext, token: &str) -> Result<Identity> {
        (**self).verify_token(ctx, token).await
    }
}

/// Password verifier backed by a [`CredentialStore`].
///
/// Checks run in order: empty username, empty password, store lookup,
/// hash comparison. A missing user maps to [`AuthError::UnknownUser`]; any
/// store error maps to [`AuthError::StoreUnavailable`].
///
/// A missing user still costs one hash comparison, against a hash the
/// verifier generates for itself on first use.
pub struct StoredPasswordVerifier<S, H> {
    store: Arc<S>,
    hasher: H,
    dummy_hash: OnceCell<String>,
}

const DUMMY_PASSWORD: &str = "ordergate-unknown-user";

impl<S, H> StoredPasswordVerifier<S, H>
where
    S: CredentialStore,
    H: PasswordHasher,
{
    /// Creates a verifier over `store` using `hasher` for comparison.
    pub fn new(store: Arc<S>, hasher: H) -> Self {
        Self { store, hasher, dummy_hash: OnceCell::new() }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Compares `password` against the dummy hash and discards the result.
    async fn verify_against_dummy(&self, password: &str) {
        match self.dummy_hash.get_or_try_init(|| self.hasher.hash(DUMMY_PASSWORD)).await {
            Ok(hash) => {
                let _ = self.hasher.verify(hash, password).await;
            },
            Err(e) => tracing::warn!(error = %e, "Dummy password hash unavailable"),
        }
    }
}

#[async_trait]
impl<S, H> PasswordVerifier for StoredPasswordVerifier<S, H>
where
    S: CredentialStore + 'static,
    H: PasswordHasher + 'static,
{
    #[tracing::instrument(skip(self, _ctx, password))]
    async fn verify_password(
        &self,
        _ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Identity> {
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        fail_point!("verifier-before-store-lookup", |_| {
            Err(AuthError::StoreUnavailable(StorageError::internal(
                "injected failure before store lookup",
            )))
        });

        let hash = match self.store.get_password_hash(username).await {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                self.verify_against_dummy(password).await;
                return Err(AuthError::UnknownUser);
            },
            Err(e) => {
                tracing::error!(error = %e, "Credential store lookup failed");
                return Err(AuthError::StoreUnavailable(e));
            },
        };

        if !self.hasher.verify(&hash, password).await {
            return Err(AuthError::PasswordMismatch);
        }

        Ok(Identity::new(username).with_extension("scheme", "basic"))
    }
}
