//! Credential storage abstraction for the ordergate authentication gateway.
//!
//! This crate provides the [`CredentialStore`] trait that the authentication
//! core depends on for password lookups, plus an in-memory implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           ordergate-authn                   │
//! │   BasicStrategy → StoredPasswordVerifier    │
//! ├─────────────────────────────────────────────┤
//! │           ordergate-storage                 │
//! │   CredentialStore trait                     │
//! │   (get_password_hash, create_credential)    │
//! ├──────────────────────┬──────────────────────┤
//! │ MemoryCredentialStore│  host SQL store      │
//! │     (testing)        │   (production)       │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Implementations map their
//! internal errors onto [`StorageError`]; the authentication core reports
//! any of them as "store unavailable".

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod error;

pub use credentials::{CredentialRecord, CredentialStore, MemoryCredentialStore};
pub use error::{BoxError, StorageError, StorageResult};
