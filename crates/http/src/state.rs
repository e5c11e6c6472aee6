//! Shared handler state.

use std::{fmt, sync::Arc};

use ordergate_authn::{
    Authenticator, BasicStrategy, BcryptHasher, CachedBearerStrategy, ExpiringCache,
    PasswordHasher, StoredPasswordVerifier, Strategy, TokenCodec,
};
use ordergate_storage::CredentialStore;

/// Everything the middleware and auth handlers need, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    authenticator: Authenticator,
    bearer: Arc<dyn Strategy>,
    codec: Arc<TokenCodec>,
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl AppState {
    /// Builds state from already-assembled parts.
    ///
    /// `bearer` is the strategy newly issued tokens are appended to; it should
    /// also be registered with `authenticator`.
    pub fn from_parts(
        authenticator: Authenticator,
        bearer: Arc<dyn Strategy>,
        codec: Arc<TokenCodec>,
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self { authenticator, bearer, codec, store, hasher }
    }

    /// Wires the standard Basic + Bearer setup over one shared cache.
    ///
    /// Basic credentials are checked against `store` with `hasher`; bearer
    /// tokens are verified by `codec`.
    pub fn with_store<S>(
        store: Arc<S>,
        hasher: BcryptHasher,
        codec: TokenCodec,
        cache: Arc<ExpiringCache>,
    ) -> Self
    where
        S: CredentialStore + 'static,
    {
        let codec = Arc::new(codec);
        let basic: Arc<dyn Strategy> = Arc::new(BasicStrategy::new(
            StoredPasswordVerifier::new(Arc::clone(&store), hasher),
            Arc::clone(&cache),
        ));
        let bearer: Arc<dyn Strategy> =
            Arc::new(CachedBearerStrategy::new(Arc::clone(&codec), cache));

        let authenticator =
            Authenticator::new().with_strategy(basic).with_strategy(Arc::clone(&bearer));

        Self::from_parts(authenticator, bearer, codec, store, Arc::new(hasher))
    }

    /// The scheme dispatcher.
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// The strategy that caches issued tokens.
    pub fn bearer(&self) -> &Arc<dyn Strategy> {
        &self.bearer
    }

    /// The token codec.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// The credential store used at signup.
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// The password hasher used at signup.
    pub fn hasher(&self) -> &Arc<dyn PasswordHasher> {
        &self.hasher
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("authenticator", &self.authenticator)
            .field("bearer", &self.bearer.scheme())
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
