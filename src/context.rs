//! Immutable snapshot of a failed attempt, handed to user hooks.

use crate::error::SharedError;
use crate::policy::Retries;

/// What `on_failed_attempt` and `should_retry` get to see.
///
/// Built fresh for each retriable failure and never mutated afterwards;
/// cloning is cheap (the error is shared).
#[derive(Debug, Clone)]
pub struct RetryContext {
    error: SharedError,
    attempt_number: u64,
    retries_left: Retries,
}

impl RetryContext {
    pub(crate) fn new(error: SharedError, attempt_number: u64, budget: Retries) -> Self {
        Self {
            error,
            attempt_number,
            retries_left: budget.left_after(attempt_number),
        }
    }

    /// The classified failure of this attempt.
    pub fn error(&self) -> &SharedError {
        &self.error
    }

    /// 1-based attempt counter.
    pub fn attempt_number(&self) -> u64 {
        self.attempt_number
    }

    /// Budget remaining after this failure.
    pub fn retries_left(&self) -> Retries {
        self.retries_left
    }
}
