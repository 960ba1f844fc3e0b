//! Scoped cancellation and per-request timeouts for every I/O call.
//!
//! An [`IoScope`] is passed explicitly into each operation that suspends on
//! the network. [`IoScope::child`] opens a nested scope whose guard cancels
//! it on drop, so anything still in flight when the enclosing operation
//! returns is dropped with it.

use std::future::Future;
use std::ops::Deref;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{Error, Result};

/// Default timeout applied to a single network request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cancellation token plus request timeout.
#[derive(Debug, Clone)]
pub struct IoScope {
    token: CancellationToken,
    request_timeout: Duration,
}

impl IoScope {
    /// Create a root scope.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            request_timeout,
        }
    }

    /// Open a nested scope, cancelled when the parent is or when the returned
    /// guard is dropped.
    pub fn child(&self) -> ScopeGuard {
        let token = self.token.child_token();
        ScopeGuard {
            scope: IoScope {
                token: token.clone(),
                request_timeout: self.request_timeout,
            },
            _guard: token.drop_guard(),
        }
    }

    /// Cancel this scope and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Fail with [`Error::Cancelled`] if the scope has already been cancelled.
    pub fn check(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled { operation });
        }
        Ok(())
    }

    /// Drive `fut` to completion under the scope's timeout and cancellation.
    ///
    /// On timeout or cancellation the future is dropped, which aborts the
    /// underlying request.
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(operation)?;

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled { operation }),
            res = tokio::time::timeout(self.request_timeout, fut) => match res {
                Ok(inner) => inner,
                Err(_) => {
                    tracing::debug!(operation, timeout = ?self.request_timeout, "request timed out");
                    Err(Error::Timeout {
                        operation,
                        after: self.request_timeout,
                    })
                }
            },
        }
    }
}

impl Default for IoScope {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

/// A nested [`IoScope`] that is cancelled when dropped.
#[derive(Debug)]
pub struct ScopeGuard {
    scope: IoScope,
    _guard: DropGuard,
}

impl Deref for ScopeGuard {
    type Target = IoScope;

    fn deref(&self) -> &IoScope {
        &self.scope
    }
}
