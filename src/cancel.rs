//! Cooperative cancellation with a reason.
//!
//! [`AbortSignal`] is a thin wrapper over `tokio_util`'s `CancellationToken`
//! that additionally records a one-shot reason value. The retry loop only
//! reads the signal (flag, reason, completion future); firing it is entirely
//! the caller's business.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::error::{Aborted, BoxError, SharedError};

/// One-shot cancellation source shared between a caller and a retry run.
///
/// Clones share the underlying token and reason slot, so any clone can fire
/// the signal and every clone observes it.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<SharedError>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal with a reason. The first reason wins; firing again is
    /// a no-op apart from re-cancelling the (idempotent) token.
    pub fn abort(&self, reason: impl Into<BoxError>) {
        let _ = self.reason.set(SharedError::from(reason.into()));
        self.token.cancel();
    }

    /// Fire the signal without recording a reason.
    pub fn abort_without_reason(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason passed to [`abort`](Self::abort), if any was recorded.
    pub fn reason(&self) -> Option<SharedError> {
        self.reason.get().cloned()
    }

    /// Synchronous throw-if-aborted check.
    pub fn check(&self) -> Result<(), Aborted> {
        if self.is_aborted() {
            Err(Aborted::from_signal("operation aborted by signal", self))
        } else {
            Ok(())
        }
    }

    /// Completes when the signal fires; immediately if it already has.
    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }
}
