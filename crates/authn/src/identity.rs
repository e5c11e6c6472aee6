//! Authenticated principals.
//!
//! An [`Identity`] is what a successful authentication resolves to. It is
//! built once by a verifier and then shared read-only (as `Arc<Identity>`)
//! between the cache, the strategies and request handlers.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A strategy-specific claim value.
///
/// Extension data is limited to this closed set so identities stay cheap to
/// compare and serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    /// A string claim.
    String(String),
    /// An integer claim.
    Number(i64),
    /// A boolean claim.
    Bool(bool),
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl ClaimValue {
    /// The integer value, if this is a number claim.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// An authenticated principal.
///
/// Fields are private: an identity cannot be changed after construction.
/// Use the `with_*` builders while assembling one inside a verifier.
///
/// # Example
///
/// ```
/// use ordergate_authn::{ClaimValue, Identity};
///
/// let identity = Identity::new("alice").with_id("42").with_extension("scheme", "basic");
///
/// assert_eq!(identity.subject(), "alice");
/// assert_eq!(identity.id(), Some("42"));
/// assert_eq!(identity.extension("scheme"), Some(&ClaimValue::from("basic")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extensions: BTreeMap<String, ClaimValue>,
}

impl Identity {
    /// Creates an identity for `subject` with no ID and no extensions.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), id: None, extensions: BTreeMap::new() }
    }

    /// Sets the opaque principal ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds one extension claim, replacing any previous value for `key`.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// The stable subject identifier (the username).
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The opaque principal ID, if the verifier supplied one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// A single extension claim.
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&ClaimValue> {
        self.extensions.get(key)
    }

    /// All extension claims, ordered by key.
    #[must_use]
    pub fn extensions(&self) -> &BTreeMap<String, ClaimValue> {
        &self.extensions
    }
}
