//! Retry with exponential backoff and bounded jitter.
//!
//! `with_safe_retry` wraps each attempt in `with_timeout` using a
//! per-operation-kind budget and backs off between attempts with
//! `min(base * 2^(i-1), max)` plus a uniform random jitter in
//! `[0, delay * jitter_ratio]`. The jitter source is injectable so
//! retry schedules are deterministic under test.

use crate::timeout::{with_timeout, TimeoutOptions};
use quarry_core::{QuarryError, QuarryResult, ResilienceError, SettingsError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry policy: attempt budget plus backoff shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (must be >= 1).
    pub attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the exponential delay (before jitter).
    pub max_delay: Duration,
    /// Fraction of the delay added as uniform jitter, in [0, 1].
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter_ratio: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt budget.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the max delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter ratio.
    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    /// Validate the policy.
    pub fn validate(&self) -> QuarryResult<()> {
        if self.attempts == 0 {
            return Err(QuarryError::Settings(SettingsError::InvalidValue {
                field: "retry.attempts".to_string(),
                value: self.attempts.to_string(),
                reason: "attempts must be at least 1".to_string(),
            }));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(QuarryError::Settings(SettingsError::InvalidValue {
                field: "retry.jitter_ratio".to_string(),
                value: self.jitter_ratio.to_string(),
                reason: "jitter_ratio must be between 0.0 and 1.0".to_string(),
            }));
        }
        Ok(())
    }
}

/// Kind of backend operation, for per-kind timeout budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Upsert,
    Delete,
    DescribeStats,
    Other,
}

/// Per-operation-kind timeout budgets.
///
/// Kinds without an override use `default`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationTimeouts {
    pub default: Duration,
    pub query: Option<Duration>,
    pub upsert: Option<Duration>,
    pub delete: Option<Duration>,
    pub describe_stats: Option<Duration>,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(30),
            query: None,
            upsert: None,
            delete: None,
            describe_stats: None,
        }
    }
}

impl OperationTimeouts {
    /// The budget for one attempt of the given kind.
    pub fn budget_for(&self, kind: OperationKind) -> Duration {
        let specific = match kind {
            OperationKind::Query => self.query,
            OperationKind::Upsert => self.upsert,
            OperationKind::Delete => self.delete,
            OperationKind::DescribeStats => self.describe_stats,
            OperationKind::Other => None,
        };
        specific.unwrap_or(self.default)
    }
}

/// Compute the backoff delay before retry `attempt` (1-indexed).
///
/// `sample` is a uniform draw from `[0, 1)`; the jitter added is
/// `sample * delay * jitter_ratio`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, sample: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let exponential = policy
        .base_delay
        .saturating_mul(1u32 << exponent)
        .min(policy.max_delay);
    let jitter = exponential.mul_f64(sample.clamp(0.0, 1.0) * policy.jitter_ratio);
    exponential + jitter
}

/// Retry an operation with jittered exponential backoff and the
/// default random jitter source.
///
/// See [`with_safe_retry_with_jitter`] for the full contract.
pub async fn with_safe_retry<T, F, Fut, A>(
    operation: &str,
    kind: OperationKind,
    policy: &RetryPolicy,
    timeouts: &OperationTimeouts,
    external: Option<CancellationToken>,
    on_attempt: A,
    make_op: F,
) -> QuarryResult<T>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = QuarryResult<T>>,
    A: FnMut(u32, Option<&QuarryError>),
{
    with_safe_retry_with_jitter(
        operation,
        kind,
        policy,
        timeouts,
        external,
        on_attempt,
        make_op,
        || rand::rng().random_range(0.0..1.0),
    )
    .await
}

/// Retry an operation with jittered exponential backoff and an
/// injected jitter source.
///
/// Each attempt is wrapped in [`with_timeout`] using the kind's
/// budget. Attempts are strictly sequential: attempt `n + 1` only
/// begins after attempt `n` fails and its backoff delay elapses.
/// Cancellation-class failures and non-retryable application errors
/// propagate immediately; after the final attempt the last error is
/// surfaced unchanged. `on_attempt(attempt, error)` fires after every
/// attempt (error present on failure, absent on success) and is the
/// sole externally observable retry telemetry hook. The backoff sleep
/// itself is pre-empted by external cancellation.
#[allow(clippy::too_many_arguments)]
pub async fn with_safe_retry_with_jitter<T, F, Fut, A, J>(
    operation: &str,
    kind: OperationKind,
    policy: &RetryPolicy,
    timeouts: &OperationTimeouts,
    external: Option<CancellationToken>,
    mut on_attempt: A,
    mut make_op: F,
    mut jitter: J,
) -> QuarryResult<T>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = QuarryResult<T>>,
    A: FnMut(u32, Option<&QuarryError>),
    J: FnMut() -> f64,
{
    policy.validate()?;
    let budget = timeouts.budget_for(kind);

    let mut attempt = 0u32;
    loop {
        attempt += 1;

        let options = TimeoutOptions {
            timeout: budget,
            external: external.clone(),
        };
        let result = with_timeout(operation, options, None, &mut make_op).await;

        match result {
            Ok(value) => {
                on_attempt(attempt, None);
                return Ok(value);
            }
            Err(err) => {
                on_attempt(attempt, Some(&err));

                if err.is_cancellation() {
                    return Err(err);
                }
                if !err.is_retryable() {
                    return Err(err);
                }
                if attempt >= policy.attempts {
                    warn!(operation, attempt, %err, "retry budget exhausted");
                    return Err(err);
                }

                let delay = backoff_delay(policy, attempt, jitter());
                debug!(operation, attempt, ?delay, %err, "retrying after backoff");

                // The backoff wait is itself cancellable.
                match &external {
                    Some(token) => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => {
                                return Err(QuarryError::Resilience(ResilienceError::Cancelled {
                                    operation: operation.to_string(),
                                    reason: "external signal aborted during backoff".to_string(),
                                }));
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::ConnectorError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn unavailable(op: &str) -> QuarryError {
        QuarryError::Connector(ConnectorError::BackendUnavailable {
            operation: op.to_string(),
            reason: "connection refused".to_string(),
        })
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350))
            .with_jitter_ratio(0.0);

        assert_eq!(backoff_delay(&policy, 1, 0.0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&policy, 2, 0.0), Duration::from_millis(200));
        // 400ms would exceed the cap.
        assert_eq!(backoff_delay(&policy, 3, 0.0), Duration::from_millis(350));
        assert_eq!(backoff_delay(&policy, 10, 0.0), Duration::from_millis(350));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter_ratio(0.5);

        let low = backoff_delay(&policy, 1, 0.0);
        let high = backoff_delay(&policy, 1, 1.0);
        assert_eq!(low, Duration::from_millis(100));
        assert_eq!(high, Duration::from_millis(150));
    }

    #[test]
    fn test_timeouts_budget_for_kind() {
        let timeouts = OperationTimeouts {
            default: Duration::from_secs(30),
            query: Some(Duration::from_secs(5)),
            ..OperationTimeouts::default()
        };
        assert_eq!(
            timeouts.budget_for(OperationKind::Query),
            Duration::from_secs(5)
        );
        assert_eq!(
            timeouts.budget_for(OperationKind::Upsert),
            Duration::from_secs(30)
        );
        assert_eq!(
            timeouts.budget_for(OperationKind::Other),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::new().validate().is_ok());
        assert!(RetryPolicy::new().with_attempts(0).validate().is_err());
        assert!(RetryPolicy::new().with_jitter_ratio(1.5).validate().is_err());
        assert!(RetryPolicy::new().with_jitter_ratio(-0.1).validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_once_then_succeed_two_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let observed: Arc<Mutex<Vec<(u32, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let observed_clone = Arc::clone(&observed);

        let result = with_safe_retry_with_jitter(
            "flaky",
            OperationKind::Query,
            &RetryPolicy::default(),
            &OperationTimeouts::default(),
            None,
            move |attempt, err| {
                observed_clone.lock().unwrap().push((attempt, err.is_some()));
            },
            move |_token| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(unavailable("flaky"))
                    } else {
                        Ok(99)
                    }
                }
            },
            || 0.0, // deterministic jitter
        )
        .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(&*observed.lock().unwrap(), &[(1, true), (2, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: QuarryResult<()> = with_safe_retry_with_jitter(
            "dead",
            OperationKind::Upsert,
            &RetryPolicy::default().with_attempts(2),
            &OperationTimeouts::default(),
            None,
            |_, _| {},
            move |_token| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable("dead"))
                }
            },
            || 0.0,
        )
        .await;

        // Original error surfaced unchanged after exactly 2 invocations.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(
            result.unwrap_err(),
            QuarryError::Connector(ConnectorError::BackendUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: QuarryResult<()> = with_safe_retry_with_jitter(
            "bad-request",
            OperationKind::Other,
            &RetryPolicy::default(),
            &OperationTimeouts::default(),
            None,
            |_, _| {},
            move |_token| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(QuarryError::Vector(
                        quarry_core::VectorError::MixedSourceTypes,
                    ))
                }
            },
            || 0.0,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.unwrap_err(),
            QuarryError::Vector(quarry_core::VectorError::MixedSourceTypes)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried_per_attempt_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let timeouts = OperationTimeouts {
            default: Duration::from_millis(10),
            ..OperationTimeouts::default()
        };

        let result: QuarryResult<()> = with_safe_retry_with_jitter(
            "hung",
            OperationKind::Query,
            &RetryPolicy::default().with_attempts(3),
            &timeouts,
            None,
            |_, _| {},
            move |_token| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            },
            || 0.0,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result.unwrap_err(),
            QuarryError::Resilience(ResilienceError::Timeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_never_retried() {
        let external = CancellationToken::new();
        external.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: QuarryResult<()> = with_safe_retry_with_jitter(
            "cancelled",
            OperationKind::Query,
            &RetryPolicy::default().with_attempts(5),
            &OperationTimeouts::default(),
            Some(external),
            |_, _| {},
            move |_token| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            },
            || 0.0,
        )
        .await;

        assert!(result.unwrap_err().is_cancellation());
        // The already-fired signal pre-empts the operation at most once.
        assert!(calls.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_preempts_backoff() {
        let external = CancellationToken::new();
        let cancel_after_first = external.clone();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let policy = RetryPolicy::default()
            .with_attempts(5)
            .with_base_delay(Duration::from_secs(3600));

        let result: QuarryResult<()> = with_safe_retry_with_jitter(
            "slow-retry",
            OperationKind::Query,
            &policy,
            &OperationTimeouts::default(),
            Some(external),
            move |attempt, _| {
                if attempt == 1 {
                    // Fire the signal while the hour-long backoff is pending.
                    cancel_after_first.cancel();
                }
            },
            move |_token| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable("slow-retry"))
                }
            },
            || 0.0,
        )
        .await;

        assert!(result.unwrap_err().is_cancellation());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
