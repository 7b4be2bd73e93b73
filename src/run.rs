//! The retry loop: drive an async operation until success, abort, or
//! exhaustion.
//!
//! Attempts are strictly sequential; the only concurrency is the race between
//! the active suspension (the operation itself, or an inter-attempt delay)
//! and the abort signal. Independent runs share no state.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;

use crate::cancel::AbortSignal;
use crate::classify::{classify, ErrorClass};
use crate::config::RetryOptions;
use crate::context::RetryContext;
use crate::error::{Aborted, BoxError, PanicError, RetryError, SharedError};
use crate::policy::Retries;

/// Run `operation` until it succeeds or the policy says stop.
///
/// The operation receives the 1-based attempt number and may be synchronous
/// work wrapped in an async block or a genuinely suspending future. On
/// failure the error is classified: an [`Aborted`] or a fatal error ends the
/// run immediately, anything else is observed by `on_failed_attempt`, checked
/// against the retry and time budgets and `should_retry`, and then retried
/// after a backoff delay that remains responsive to the abort signal.
pub async fn retry<T, F, Fut>(mut operation: F, options: RetryOptions) -> Result<T, RetryError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<T, BoxError>>,
{
    let max_attempts = match options.retries {
        Retries::Count(n) if n < 0 => return Err(RetryError::NegativeRetries(n)),
        bounded => bounded.max_attempts(),
    };

    if let Some(signal) = &options.signal {
        signal.check()?;
    }

    let started = Instant::now();
    let mut attempt: u64 = 0;

    while max_attempts.map_or(true, |max| attempt < max) {
        attempt += 1;

        if let Some(signal) = &options.signal {
            signal.check()?;
        }

        let error = match run_attempt(operation(attempt), options.signal.as_ref()).await? {
            Ok(value) => {
                // Abort wins only if it fired before this check; afterwards
                // the resolution stands.
                if let Some(signal) = &options.signal {
                    signal.check()?;
                }
                if attempt > 1 {
                    tracing::trace!(attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        match classify(error.as_ref()) {
            ErrorClass::Abort => {
                let aborted = match error.downcast::<Aborted>() {
                    Ok(aborted) => *aborted,
                    Err(other) => Aborted::with_cause("operation aborted", other),
                };
                tracing::debug!(attempt, "operation aborted from inside the attempt");
                return Err(RetryError::Aborted(aborted));
            }
            ErrorClass::Fatal => {
                tracing::trace!(attempt, error = %error, "fatal error, not retrying");
                return Err(RetryError::Operation(SharedError::from(error)));
            }
            ErrorClass::Retriable => {}
        }

        let error = SharedError::from(error);
        let context = RetryContext::new(error.clone(), attempt, options.retries);

        if let Some(hook) = options.on_failed_attempt.as_deref() {
            if let Err(hook_error) = hook(context.clone()).await {
                tracing::trace!(attempt, "on_failed_attempt failed, abandoning retries");
                return Err(RetryError::Hook(SharedError::from(hook_error)));
            }
        }

        let elapsed = started.elapsed();
        let last_attempt = max_attempts.is_some_and(|max| attempt >= max);
        if elapsed >= options.max_retry_time || last_attempt {
            tracing::trace!(
                attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %error,
                "retries exhausted"
            );
            return Err(RetryError::Operation(error));
        }

        if let Some(predicate) = options.should_retry.as_deref() {
            match predicate(context).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::trace!(attempt, error = %error, "should_retry vetoed further attempts");
                    return Err(RetryError::Operation(error));
                }
                Err(hook_error) => {
                    tracing::trace!(attempt, "should_retry failed, abandoning retries");
                    return Err(RetryError::Hook(SharedError::from(hook_error)));
                }
            }
        }

        let mut delay = options.backoff.delay_for(attempt);
        if options.max_retry_time != Duration::MAX {
            let remaining = options.max_retry_time.saturating_sub(elapsed);
            if remaining.is_zero() {
                return Err(RetryError::Operation(error));
            }
            delay = delay.min(remaining);
        }

        tracing::trace!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying after delay"
        );

        if delay.is_zero() {
            // Keep zero-delay loops cooperative.
            tokio::task::yield_now().await;
            continue;
        }

        match &options.signal {
            Some(signal) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = signal.aborted() => {
                        tracing::debug!(attempt, "aborted during retry delay");
                        return Err(RetryError::Aborted(Aborted::from_signal(
                            "retry aborted during delay",
                            signal,
                        )));
                    }
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }

    Err(RetryError::Internal("retry loop ended without a verdict"))
}

/// One attempt: run the operation raced against the signal, normalizing a
/// panic into a [`PanicError`] failure.
async fn run_attempt<T, Fut>(
    fut: Fut,
    signal: Option<&AbortSignal>,
) -> Result<Result<T, BoxError>, RetryError>
where
    Fut: Future<Output = Result<T, BoxError>>,
{
    let guarded = AssertUnwindSafe(fut).catch_unwind();
    let outcome = match signal {
        Some(signal) => {
            tokio::select! {
                outcome = guarded => outcome,
                _ = signal.aborted() => {
                    tracing::debug!("aborted during attempt");
                    return Err(RetryError::Aborted(Aborted::from_signal(
                        "retry aborted during attempt",
                        signal,
                    )));
                }
            }
        }
        None => guarded.await,
    };

    Ok(match outcome {
        Ok(result) => result,
        Err(payload) => Err(Box::new(PanicError::from_payload(payload)) as BoxError),
    })
}

/// Wrap `f` so every call retries it under `options`.
///
/// Argument-currying adapter over [`retry`]: the args value (a tuple for
/// multiple arguments) is cloned into every attempt unchanged. No logic of
/// its own.
pub fn retriable<A, T, F, Fut>(
    f: F,
    options: RetryOptions,
) -> impl FnMut(A) -> BoxFuture<'static, Result<T, RetryError>>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    move |args: A| {
        let f = f.clone();
        let options = options.clone();
        retry(move |_attempt| f(args.clone()), options).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FatalError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn options_fast() -> RetryOptions {
        RetryOptions::new().min_timeout(Duration::from_millis(1))
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_stops_without_calling_hooks() {
        let calls = Arc::new(AtomicU64::new(0));
        let hook_calls = Arc::new(AtomicU64::new(0));

        let op_calls = calls.clone();
        let observed = hook_calls.clone();
        let result: Result<u32, _> = retry(
            move |_| {
                let op_calls = op_calls.clone();
                async move {
                    op_calls.fetch_add(1, Ordering::SeqCst);
                    Err(Box::new(FatalError::new("bad credentials")) as BoxError)
                }
            },
            options_fast().retries(5).on_failed_attempt(move |_ctx| {
                let observed = observed.clone();
                async move {
                    observed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Operation(_)), "{err:?}");
        assert_eq!(err.to_string(), "bad credentials");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no retry after fatal");
        assert_eq!(hook_calls.load(Ordering::SeqCst), 0, "no hook after fatal");
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_from_inside_the_operation_short_circuits() {
        let calls = Arc::new(AtomicU64::new(0));
        let op_calls = calls.clone();
        let result: Result<u32, _> = retry(
            move |attempt| {
                let op_calls = op_calls.clone();
                async move {
                    op_calls.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err("transient".into())
                    } else {
                        Err(Box::new(Aborted::new("stop now")) as BoxError)
                    }
                }
            },
            options_fast().retries(10),
        )
        .await;

        match result.unwrap_err() {
            RetryError::Aborted(aborted) => assert_eq!(aborted.message(), "stop now"),
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hook_failure_replaces_the_operation_error() {
        let result: Result<u32, _> = retry(
            |_| async { Err::<u32, BoxError>("boom".into()) },
            options_fast()
                .retries(10)
                .on_failed_attempt(|_ctx| async { Err("hook down".into()) }),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Hook(_)), "{err:?}");
        assert_eq!(err.to_string(), "retry hook failed: hook down");
    }

    #[tokio::test(start_paused = true)]
    async fn should_retry_failure_is_a_hook_error() {
        let result: Result<u32, _> = retry(
            |_| async { Err::<u32, BoxError>("boom".into()) },
            options_fast()
                .retries(10)
                .should_retry(|_ctx| async { Err("predicate down".into()) }),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Hook(_)), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_operation_is_wrapped_and_retried() {
        let calls = Arc::new(AtomicU64::new(0));
        let op_calls = calls.clone();
        let result: Result<u32, _> = retry(
            move |_| {
                let op_calls = op_calls.clone();
                async move {
                    if op_calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        panic!("kaboom");
                    }
                    Ok(7)
                }
            },
            options_fast().retries(5),
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_payload_survives_to_the_rejection() {
        let result: Result<u32, _> = retry(
            |_| async { panic!("kaboom") },
            options_fast().retries(1),
        )
        .await;

        let err = result.unwrap_err();
        assert!(
            err.to_string()
                .contains("non-error payload: \"kaboom\""),
            "{err}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn network_flagged_fatal_errors_are_retried() {
        let calls = Arc::new(AtomicU64::new(0));
        let op_calls = calls.clone();
        let result: Result<u32, _> = retry(
            move |attempt| {
                let op_calls = op_calls.clone();
                async move {
                    op_calls.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err(Box::new(FatalError::new("fetch failed")) as BoxError)
                    } else {
                        Ok(1)
                    }
                }
            },
            options_fast().retries(5),
        )
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
