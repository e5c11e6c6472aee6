//! Per-request cancellation and deadline.
//!
//! The gateway imposes no timeouts of its own. Instead the host hands every
//! authentication call a [`RequestContext`] that is cancelled when the client
//! goes away, optionally with an absolute deadline. Strategies race the
//! verifier against it and drop the verification future when it fires.

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::AuthError;

/// Cancellation and deadline carried through one authentication attempt.
///
/// Cloning shares the same underlying token: cancelling any clone cancels all
/// of them.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled unless [`cancel`](Self::cancel) is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing token, typically a child of a server-wide shutdown token.
    #[must_use]
    pub fn from_token(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a guard that cancels the context when dropped.
    ///
    /// Hold it for the lifetime of the request future so a dropped
    /// connection aborts in-flight verification.
    #[must_use]
    pub fn drop_guard(&self) -> DropGuard {
        self.cancel.clone().drop_guard()
    }

    /// Returns `true` once cancelled or past the deadline.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancel.cancelled() => {},
                    () = tokio::time::sleep_until(deadline) => {},
                }
            },
            None => self.cancel.cancelled().await,
        }
    }

    /// Runs `fut` to completion unless the context finishes first.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cancelled`] if the context is cancelled or its
    /// deadline passes before `fut` completes; `fut` is dropped in that case.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        if self.is_done() {
            return Err(AuthError::Cancelled);
        }

        tokio::select! {
            biased;
            () = self.done() => Err(AuthError::Cancelled),
            result = fut => result,
        }
    }
}
