//! Error types surfaced by the retry loop.
//!
//! The wrapped operation reports failures as boxed `dyn Error` values so the
//! loop stays generic over what callers throw. Once a failure is classified
//! as retriable it is shared (`Arc`) between the hooks that observe it and
//! the final rejection handed back to the caller.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::cancel::AbortSignal;

/// Failure type produced by the wrapped operation and by hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A classified failure shared between hook contexts and the final verdict.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Explicit, non-retriable termination of the retry loop.
///
/// Returned by the loop when an [`AbortSignal`] fires, and constructible by
/// the operation itself (`Err(Aborted::new("…").into())`) to stop retrying
/// immediately. Never passed to `should_retry`.
#[derive(Debug, Clone)]
pub struct Aborted {
    message: String,
    cause: Option<SharedError>,
    signal: Option<AbortSignal>,
}

impl Aborted {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            signal: None,
        }
    }

    /// Abort with an underlying cause (e.g. the original error that made
    /// further attempts pointless).
    pub fn with_cause(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            cause: Some(SharedError::from(cause.into())),
            signal: None,
        }
    }

    /// Abort produced from a fired signal: the signal's reason becomes the
    /// cause and the signal itself stays reachable from the error.
    pub(crate) fn from_signal(message: impl Into<String>, signal: &AbortSignal) -> Self {
        Self {
            message: message.into(),
            cause: signal.reason(),
            signal: Some(signal.clone()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&SharedError> {
        self.cause.as_ref()
    }

    /// The signal that triggered this abort, when one was involved.
    pub fn signal(&self) -> Option<&AbortSignal> {
        self.signal.as_ref()
    }
}

impl fmt::Display for Aborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Aborted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

/// Marks a failure as not worth retrying.
///
/// The classifier stops the loop on these without consulting hooks, with one
/// exception: adapter layers that blanket-mark HTTP failures as fatal tend to
/// swallow connectivity errors too, so a `FatalError` whose message matches
/// [`crate::classify::NETWORK_ERROR_MESSAGES`] is treated as retriable.
#[derive(Debug)]
pub struct FatalError(BoxError);

impl FatalError {
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }

    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FatalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// A panicking operation, normalized into an error value.
///
/// The panic payload is the one failure path that does not arrive as an
/// `Error`; stringifying it here keeps the classifier and hooks working on
/// error-shaped values only.
#[derive(Debug, Clone)]
pub struct PanicError {
    payload: String,
}

impl PanicError {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let payload = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string payload>".to_owned()
        };
        Self { payload }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation panicked with non-error payload: \"{}\"",
            self.payload
        )
    }
}

impl std::error::Error for PanicError {}

/// Rejection returned by [`crate::retry`]: the single, definitive stopping
/// cause of a run.
#[derive(Debug, Clone, Error)]
pub enum RetryError {
    /// The configured retry count was negative. Raised before any attempt.
    #[error("retries must be non-negative, got {0}")]
    NegativeRetries(i64),
    /// The signal fired, or the operation returned an [`Aborted`].
    #[error(transparent)]
    Aborted(#[from] Aborted),
    /// The last classified operation error: budget exhausted, `should_retry`
    /// veto, or a fatal classification.
    #[error(transparent)]
    Operation(SharedError),
    /// `on_failed_attempt` or `should_retry` failed; replaces the operation's
    /// error.
    #[error("retry hook failed: {0}")]
    Hook(#[source] SharedError),
    /// The loop exited without producing a verdict. Unreachable by
    /// construction.
    #[error("internal retry invariant violated: {0}")]
    Internal(&'static str),
}
