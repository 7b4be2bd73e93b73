//! Retry fallible async operations.
//!
//! This crate drives a caller-supplied operation through repeated attempts
//! with exponential backoff (optionally jittered), a wall-clock time budget,
//! failure-inspection hooks, and cooperative cancellation. The pieces:
//!
//! - [`retry`] — the loop itself: attempt counting, error classification,
//!   delay computation, budget enforcement, cancellation interleaving.
//! - [`RetryOptions`] — merged configuration with sane defaults.
//! - [`Backoff`] / [`Retries`] — the plain-data policy, serializable so it
//!   can live in application config files.
//! - [`AbortSignal`] — reason-carrying cancellation raced against attempts
//!   and delays.
//! - [`Aborted`] / [`FatalError`] — error markers that stop the loop early.
//! - [`retriable`] — argument-currying wrapper that turns a function into a
//!   retrying version of itself.

pub mod cancel;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod policy;
pub mod run;

pub use cancel::AbortSignal;
pub use classify::{classify, is_network_error, ErrorClass, NETWORK_ERROR_MESSAGES};
pub use config::RetryOptions;
pub use context::RetryContext;
pub use error::{Aborted, BoxError, FatalError, PanicError, RetryError, SharedError};
pub use policy::{Backoff, Retries};
pub use run::{retriable, retry};
