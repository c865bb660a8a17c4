//! Cancellation and deadline scope for one reconciliation run
//!
//! Collaborators do not see the context. The reconciler and the dispatcher
//! wrap every collaborator future with [`RunContext::guard`], which drops the
//! in-flight call as soon as the run is cancelled or its deadline passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cancellation token plus optional deadline shared by all calls of a run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the run by `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Bound the run by an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Token that cancels this run
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline of this run, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel the run; in-flight and subsequent guarded calls fail with [`Error::Cancelled`]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// True if guarded calls would fail immediately
    pub fn is_interrupted(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Run `fut` unless the context is cancelled or its deadline passes first
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled),
            _ = deadline => Err(Error::TimedOut),
            result = fut => result,
        }
    }
}
