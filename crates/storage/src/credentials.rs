//! Credential records and the store trait the authentication core reads from.
//!
//! The authenticator never touches a database directly. It depends on the
//! narrow [`CredentialStore`] contract: look up the password hash for a
//! username, and insert a record at signup. Production deployments back this
//! with their relational store; [`MemoryCredentialStore`] serves tests and
//! local development.
//!
//! # Usage
//!
//! ```
//! use ordergate_storage::{CredentialRecord, CredentialStore, MemoryCredentialStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = MemoryCredentialStore::new();
//! store.create_credential(CredentialRecord::new("alice", "$2b$10$...")).await.unwrap();
//!
//! let hash = store.get_password_hash("alice").await.unwrap();
//! assert_eq!(hash.as_deref(), Some("$2b$10$..."));
//! # });
//! ```

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// A stored login: the username and the salted one-way hash of its password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Unique login name.
    pub username: String,
    /// Salted password hash (bcrypt modular crypt format).
    pub password_hash: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("password_hash", &"[redacted]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Persistence layer for login credentials.
///
/// # Error Handling
///
/// A missing user is not an error: [`get_password_hash`](Self::get_password_hash)
/// returns `Ok(None)`. Errors are reserved for the store itself failing, which
/// callers treat as an upstream outage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the stored password hash for `username`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(hash))` if the user exists
    /// - `Ok(None)` if the user doesn't exist
    /// - `Err(...)` on storage errors
    async fn get_password_hash(&self, username: &str) -> StorageResult<Option<String>>;

    /// Stores a new credential record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the username is already taken,
    /// or a connection/internal error if the store is unavailable.
    async fn create_credential(&self, record: CredentialRecord) -> StorageResult<()>;

    /// Removes the credential for `username`.
    ///
    /// Returns `Ok(true)` if a record was removed, `Ok(false)` if none existed.
    async fn delete_credential(&self, username: &str) -> StorageResult<bool>;
}

/// In-memory implementation of [`CredentialStore`].
///
/// Records live in a [`parking_lot::RwLock`]-guarded map shared by all
/// clones. Calling [`set_unavailable`](Self::set_unavailable) makes every
/// operation fail with a connection error, which lets tests drive the
/// "store unavailable" path without a real database.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    records: Arc<RwLock<HashMap<String, CredentialRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryCredentialStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage (`true`) or recovery (`false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(StorageError::connection("credential store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    #[tracing::instrument(skip(self))]
    async fn get_password_hash(&self, username: &str) -> StorageResult<Option<String>> {
        self.check_available()?;
        Ok(self.records.read().get(username).map(|record| record.password_hash.clone()))
    }

    #[tracing::instrument(skip(self, record), fields(username = %record.username))]
    async fn create_credential(&self, record: CredentialRecord) -> StorageResult<()> {
        self.check_available()?;
        let mut records = self.records.write();

        if records.contains_key(&record.username) {
            return Err(StorageError::conflict(record.username));
        }

        records.insert(record.username.clone(), record);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_credential(&self, username: &str) -> StorageResult<bool> {
        self.check_available()?;
        Ok(self.records.write().remove(username).is_some())
    }
}
