//! Caller-facing retry configuration.
//!
//! All knobs are optional with defaults; the merged options are read-only for
//! the duration of a run. Options are `Clone` so one configured value can
//! drive many independent runs.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::cancel::AbortSignal;
use crate::context::RetryContext;
use crate::error::BoxError;
use crate::policy::{Backoff, Retries};

pub(crate) type AttemptHook =
    Arc<dyn Fn(RetryContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;
pub(crate) type RetryPredicate =
    Arc<dyn Fn(RetryContext) -> BoxFuture<'static, Result<bool, BoxError>> + Send + Sync>;

/// Configuration for a retry run.
///
/// Defaults: 10 retries (11 attempts), factor 2, 1s base delay, no delay cap,
/// no jitter, no time budget, no hooks, no signal.
#[derive(Clone)]
pub struct RetryOptions {
    pub(crate) retries: Retries,
    pub(crate) backoff: Backoff,
    pub(crate) max_retry_time: Duration,
    pub(crate) signal: Option<AbortSignal>,
    pub(crate) on_failed_attempt: Option<AttemptHook>,
    pub(crate) should_retry: Option<RetryPredicate>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: Retries::default(),
            backoff: Backoff::default(),
            max_retry_time: Duration::MAX,
            signal: None,
            on_failed_attempt: None,
            should_retry: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("retries", &self.retries)
            .field("backoff", &self.backoff)
            .field("max_retry_time", &self.max_retry_time)
            .field("signal", &self.signal)
            .field("on_failed_attempt", &self.on_failed_attempt.is_some())
            .field("should_retry", &self.should_retry.is_some())
            .finish()
    }
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum retry count after the first attempt. Negative values are kept
    /// and rejected when the run starts.
    pub fn retries(mut self, count: i64) -> Self {
        self.retries = Retries::Count(count);
        self
    }

    /// Remove the attempt bound; the time budget, `should_retry`, or an abort
    /// must terminate the loop.
    pub fn unlimited_retries(mut self) -> Self {
        self.retries = Retries::Unlimited;
        self
    }

    /// Replace the whole backoff policy at once.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Backoff multiplier base.
    pub fn factor(mut self, factor: f64) -> Self {
        self.backoff.factor = factor;
        self
    }

    /// Base delay before the first retry.
    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.backoff.min_timeout = min_timeout;
        self
    }

    /// Upper clamp on any single delay.
    pub fn max_timeout(mut self, max_timeout: Duration) -> Self {
        self.backoff.max_timeout = max_timeout;
        self
    }

    /// Jitter each delay by a uniform factor in `[1, 2)`.
    pub fn randomize(mut self, randomize: bool) -> Self {
        self.backoff.randomize = randomize;
        self
    }

    /// Wall-clock ceiling on the whole run, delays included.
    pub fn max_retry_time(mut self, max_retry_time: Duration) -> Self {
        self.max_retry_time = max_retry_time;
        self
    }

    /// External abort source; checked around every suspension point and raced
    /// against the operation and the inter-attempt delays.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Observer invoked after every retriable failure, before the
    /// continue/stop decision. Returning `Err` abandons the run with that
    /// error.
    pub fn on_failed_attempt<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RetryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let wrapped: AttemptHook = Arc::new(move |ctx| Box::pin(hook(ctx)));
        self.on_failed_attempt = Some(wrapped);
        self
    }

    /// Veto over continuing after a retriable failure. Only consulted when
    /// the retry and time budgets still allow another attempt; returning
    /// `Err` abandons the run with that error.
    pub fn should_retry<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(RetryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
    {
        let wrapped: RetryPredicate = Arc::new(move |ctx| Box::pin(predicate(ctx)));
        self.should_retry = Some(wrapped);
        self
    }
}
