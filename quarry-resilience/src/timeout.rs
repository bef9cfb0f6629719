//! Cancellable timeout wrapper.
//!
//! `with_timeout` races an operation against a timer and an optional
//! external cancellation token. Exactly one of success, timeout, or
//! external cancellation wins; the losing branches are dropped by the
//! `select!` so their wakers are inert afterwards.

use quarry_core::{QuarryError, QuarryResult, ResilienceError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for a single timed operation.
#[derive(Debug, Clone)]
pub struct TimeoutOptions {
    /// Budget for the operation.
    pub timeout: Duration,
    /// External cancellation signal. When it fires, the call fails
    /// immediately with `Cancelled` and does not wait for the timer.
    pub external: Option<CancellationToken>,
}

impl TimeoutOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            external: None,
        }
    }

    /// Attach an external cancellation token.
    pub fn with_external(mut self, token: CancellationToken) -> Self {
        self.external = Some(token);
        self
    }
}

/// Race an operation against a timer and an external cancellation
/// signal.
///
/// The operation receives a child `CancellationToken`; on timer expiry
/// that token is cancelled (so a cooperative operation can stop its
/// backend call), `on_timeout` is invoked, and the call fails with
/// `Timeout`. On external cancellation the child token is cancelled
/// and the call fails immediately with `Cancelled`.
///
/// Cancellation wins the race against both success and timeout when
/// the signals arrive together.
pub async fn with_timeout<T, F, Fut>(
    operation: &str,
    options: TimeoutOptions,
    on_timeout: Option<Box<dyn FnOnce() + Send>>,
    run: F,
) -> QuarryResult<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = QuarryResult<T>>,
{
    let internal = CancellationToken::new();
    let fut = run(internal.child_token());
    tokio::pin!(fut);

    let external = options.external.clone();
    let external_fired = async {
        match &external {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;

        _ = external_fired => {
            internal.cancel();
            Err(QuarryError::Resilience(ResilienceError::Cancelled {
                operation: operation.to_string(),
                reason: "external signal aborted".to_string(),
            }))
        }
        result = &mut fut => result,
        _ = tokio::time::sleep(options.timeout) => {
            internal.cancel();
            if let Some(callback) = on_timeout {
                callback();
            }
            Err(QuarryError::Resilience(ResilienceError::Timeout {
                operation: operation.to_string(),
                waited: options.timeout,
            }))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fast_operation_succeeds() {
        let result = with_timeout(
            "fast",
            TimeoutOptions::new(Duration::from_secs(1)),
            None,
            |_token| async { Ok::<_, QuarryError>(42) },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out() {
        let result: QuarryResult<()> = with_timeout(
            "slow",
            TimeoutOptions::new(Duration::from_millis(50)),
            None,
            |_token| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Resilience(ResilienceError::Timeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_invokes_callback_and_cancels_internal_token() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let saw_cancel_clone = Arc::clone(&saw_cancel);

        let result: QuarryResult<()> = with_timeout(
            "slow",
            TimeoutOptions::new(Duration::from_millis(50)),
            Some(Box::new(move || fired_clone.store(true, Ordering::SeqCst))),
            |token| async move {
                token.cancelled().await;
                saw_cancel_clone.store(true, Ordering::SeqCst);
                // Keep running past the budget; the select drops us.
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
        )
        .await;

        assert!(result.is_err());
        assert!(fired.load(Ordering::SeqCst), "on_timeout must fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel_wins_over_timer() {
        let external = CancellationToken::new();
        external.cancel();

        let result: QuarryResult<()> = with_timeout(
            "cancelled",
            TimeoutOptions::new(Duration::from_secs(10)).with_external(external),
            None,
            |_token| async {
                tokio::time::sleep(Duration::from_secs(20)).await;
                Ok(())
            },
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_cancellation(), "expected Cancelled, got {err:?}");
    }

    #[tokio::test]
    async fn test_external_cancel_beats_ready_success() {
        // Both the external signal and the operation are ready on the
        // first poll; cancellation must win.
        let external = CancellationToken::new();
        external.cancel();

        let invoked = Arc::new(AtomicU32::new(0));
        let invoked_clone = Arc::clone(&invoked);

        let result: QuarryResult<u32> = with_timeout(
            "raced",
            TimeoutOptions::new(Duration::from_secs(1)).with_external(external),
            None,
            |_token| async move {
                invoked_clone.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            },
        )
        .await;

        assert!(result.unwrap_err().is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_propagates_unwrapped() {
        let result: QuarryResult<()> = with_timeout(
            "failing",
            TimeoutOptions::new(Duration::from_secs(1)),
            None,
            |_token| async {
                Err(QuarryError::Connector(
                    quarry_core::ConnectorError::BackendUnavailable {
                        operation: "failing".to_string(),
                        reason: "boom".to_string(),
                    },
                ))
            },
        )
        .await;

        assert!(matches!(
            result.unwrap_err(),
            QuarryError::Connector(quarry_core::ConnectorError::BackendUnavailable { .. })
        ));
    }
}
