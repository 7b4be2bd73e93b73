//! Classify a failure into abort / fatal / retriable.
//!
//! The classifier works on the dynamic error value the operation returned:
//! an [`Aborted`] short-circuits the loop, a [`FatalError`] stops it without
//! consulting hooks, and everything else is considered transient. The one
//! heuristic: fatal-marked errors whose message looks like a connectivity
//! failure are downgraded to retriable, because HTTP adapter layers that
//! blanket-mark failures fatal routinely swallow network errors too.

use crate::error::{Aborted, FatalError};

/// Verdict for a single failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Stop immediately and surface as [`crate::RetryError::Aborted`];
    /// bypasses hooks and budgets.
    Abort,
    /// Propagate without retrying; no context is built and no hook runs.
    Fatal,
    /// Retried subject to the budgets and `should_retry`.
    Retriable,
}

/// Message fragments (lowercase) that identify connectivity failures as
/// reported by common HTTP clients. Matched case-insensitively by
/// [`is_network_error`]; inherently heuristic, extend as new phrasings show
/// up in the wild.
pub const NETWORK_ERROR_MESSAGES: &[&str] = &[
    "network error",
    "failed to fetch",
    "load failed",
    "networkerror when attempting to fetch resource",
    "the internet connection appears to be offline",
    "network request failed",
    "fetch failed",
    "terminated",
];

/// Whether `message` matches the connectivity allow-list.
pub fn is_network_error(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    NETWORK_ERROR_MESSAGES
        .iter()
        .any(|needle| message.contains(needle))
}

/// Classify a failure returned by the operation.
pub fn classify(error: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorClass {
    if error.downcast_ref::<Aborted>().is_some() {
        return ErrorClass::Abort;
    }
    if let Some(fatal) = error.downcast_ref::<FatalError>() {
        if is_network_error(&fatal.to_string()) {
            return ErrorClass::Retriable;
        }
        return ErrorClass::Fatal;
    }
    ErrorClass::Retriable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, PanicError};

    fn classify_boxed(error: BoxError) -> ErrorClass {
        classify(error.as_ref())
    }

    #[test]
    fn aborted_is_abort() {
        assert_eq!(
            classify_boxed(Box::new(Aborted::new("stop"))),
            ErrorClass::Abort
        );
    }

    #[test]
    fn fatal_marker_is_fatal() {
        assert_eq!(
            classify_boxed(Box::new(FatalError::new("bad credentials"))),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn fatal_marker_with_network_message_is_retriable() {
        for message in ["Network error", "fetch failed", "Load Failed"] {
            assert_eq!(
                classify_boxed(Box::new(FatalError::new(message))),
                ErrorClass::Retriable,
                "{message}"
            );
        }
    }

    #[test]
    fn ordinary_errors_are_retriable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(classify_boxed(Box::new(io)), ErrorClass::Retriable);
        assert_eq!(classify_boxed("plain string error".into()), ErrorClass::Retriable);
    }

    #[test]
    fn panic_wrapper_is_retriable() {
        let wrapped = PanicError::from_payload(Box::new("kaboom"));
        assert_eq!(classify_boxed(Box::new(wrapped)), ErrorClass::Retriable);
    }

    #[test]
    fn network_matching_is_case_insensitive() {
        assert!(is_network_error("The Internet Connection Appears To Be Offline"));
        assert!(is_network_error("request TERMINATED early"));
        assert!(!is_network_error("permission denied"));
    }
}
