//! One-way password hashing.
//!
//! The gateway only needs two operations: hash a plaintext at signup and
//! check a plaintext against a stored hash at login. [`BcryptHasher`] is the
//! default implementation. Both operations are deliberately slow, so they run
//! on Tokio's blocking pool.

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// Salted one-way password hashing.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hashes `plaintext` with a fresh salt.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing itself fails.
    async fn hash(&self, plaintext: &str) -> Result<String>;

    /// Returns `true` if `plaintext` matches `hash`.
    ///
    /// A hash that cannot be parsed counts as a mismatch.
    async fn verify(&self, hash: &str, plaintext: &str) -> bool;
}

/// bcrypt-based [`PasswordHasher`].
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Creates a hasher with the given work factor (4 to 31).
    #[must_use]
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// The work factor.
    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    async fn hash(&self, plaintext: &str) -> Result<String> {
        let cost = self.cost;
        let plaintext = Zeroizing::new(plaintext.to_owned());

        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext.as_bytes(), cost))
            .await
            .map_err(|e| AuthError::PasswordHashing(format!("hashing task failed: {e}")))?
            .map_err(|e| AuthError::PasswordHashing(e.to_string()))
    }

    async fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let hash = hash.to_owned();
        let plaintext = Zeroizing::new(plaintext.to_owned());

        match tokio::task::spawn_blocking(move || bcrypt::verify(plaintext.as_bytes(), &hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                false
            },
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            },
        }
    }
}
