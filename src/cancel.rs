//! Per-turn cancellation.
//!
//! A [`CancelToken`] is created when a turn starts and is threaded through
//! the turn controller explicitly. Clones share the same flag, so the
//! session facade can keep one clone and cancel the turn from outside the
//! generation loop.

use tokio_util::sync::CancellationToken;

/// A shared, request-scoped cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    /// A fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves when the token is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }
}
