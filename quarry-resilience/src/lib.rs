//! QUARRY Resilience - Timeout and Retry Primitives
//!
//! The machinery that shields callers from transient backend failures:
//! a cancellable timeout wrapper and retry-with-jittered-backoff,
//! generic over any asynchronous operation. External cancellation is a
//! `tokio_util` `CancellationToken` passed down every call chain.

pub mod retry;
pub mod timeout;

pub use retry::{
    backoff_delay, with_safe_retry, with_safe_retry_with_jitter, OperationKind, OperationTimeouts,
    RetryPolicy,
};
pub use timeout::{with_timeout, TimeoutOptions};
