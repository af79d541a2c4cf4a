use std::{future::Future, time::Duration};

use log::warn;
use thiserror::Error;

use crate::data::fetcher::FetchError;

/// How a wrapped fetch sequence ends when it cannot produce a window.
#[derive(Debug, Error)]
pub enum RetryError {
    /// The retry budget ran out on retryable failures. Non-fatal for the
    /// run; the walker reports the partition as failed with partial data.
    #[error("fetch exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: FetchError },

    /// A protocol error: malformed data is not recoverable by waiting.
    #[error("{0}")]
    Fatal(FetchError),
}

/// Retry budget and backoff shape for one fetch call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_cap: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_cap,
        }
    }

    /// Exponential delay, capped: min(2^attempt, cap) seconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt);
        Duration::from_secs(secs).min(self.backoff_cap)
    }
}

/// Wraps any fetch future factory with the retry/backoff policy.
///
/// RateLimited and Transient both draw from the same attempt budget and
/// both back off exponentially; Protocol fails immediately.
pub async fn fetch_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(RetryError::Fatal(err)),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                let delay = policy.backoff_delay(attempt - 1);
                warn!(
                    "{context}: attempt {attempt}/{} failed ({err}), retrying in {:.0}s",
                    policy.max_attempts,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_r_minus_one_times_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let started = Instant::now();

        let result = fetch_with_retry(&policy(5), "test", move || {
            let calls = calls_in_op.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 4 {
                    Err(FetchError::RateLimited("429".into()))
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // Four backoff sleeps observed: 1 + 2 + 4 + 8 seconds.
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_on_persistent_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: Result<(), _> = fetch_with_retry(&policy(3), "test", move || {
            calls_in_op.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Transient("timeout".into())) }
        })
        .await;

        match result.unwrap_err() {
            RetryError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_error_fails_without_retry_or_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let started = Instant::now();

        let result: Result<(), _> = fetch_with_retry(&policy(5), "test", move || {
            calls_in_op.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Protocol("malformed".into())) }
        })
        .await;

        assert!(matches!(result.unwrap_err(), RetryError::Fatal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn backoff_is_exponential_with_cap() {
        let p = RetryPolicy::new(8, Duration::from_secs(30));
        assert_eq!(p.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(p.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(p.backoff_delay(4), Duration::from_secs(16));
        assert_eq!(p.backoff_delay(5), Duration::from_secs(30));
        assert_eq!(p.backoff_delay(20), Duration::from_secs(30));
    }
}
