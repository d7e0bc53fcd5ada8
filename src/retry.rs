use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{ApiError, ApiResult};

/// Exponential backoff settings for caller-initiated retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    // Delay before retry number `retry` (1-based): base * 2^(retry-1), capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. Only 429/502/503/504 are retried.
///
/// A `retry_after` hint on the error raises the backoff to at least that
/// long; if the hint exceeds `max_delay` the error is returned as is so the
/// caller can surface the wait instead of sleeping through it.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut op: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut retries = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retries < policy.max_retries => {
                let hinted = e.retry_after.map(Duration::from_secs);
                if hinted.is_some_and(|hint| hint > policy.max_delay) {
                    warn!(
                        error = %e,
                        retry_after = ?e.retry_after,
                        "server asked for a longer wait than the retry policy allows"
                    );
                    return Err(e);
                }

                retries += 1;
                let backoff = policy
                    .delay_for(retries)
                    .max(hinted.unwrap_or_default());

                warn!(
                    error = %e,
                    status = ?e.status_code,
                    retry = retries,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying request"
                );

                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_delays_increase_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_two_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = Arc::clone(&calls);
        let result = retry_with_backoff(RetryPolicy::default(), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ApiError::from_status(503, None))
                } else {
                    Ok("order-1")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "order-1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s then 2s
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
        assert!(waited < Duration::from_millis(3100), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = Arc::clone(&calls);
        let result: ApiResult<()> = retry_with_backoff(RetryPolicy::default(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::from_status(400, None))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().status_code, Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result: ApiResult<()> = retry_with_backoff(RetryPolicy::default(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::from_status(502, None))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().status_code, Some(502));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_stretches_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = Arc::clone(&calls);
        let result = retry_with_backoff(RetryPolicy::default(), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ApiError::from_status(429, None).with_retry_after(7))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(7), "waited {waited:?}");
        assert!(waited < Duration::from_millis(7100), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_beyond_max_delay_gives_up() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = Arc::clone(&calls);
        // translated 429 defaults to a 60s hint, above the 30s cap
        let result: ApiResult<()> = retry_with_backoff(RetryPolicy::default(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::from_status(429, None))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.retry_after, Some(60));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_side_rejection_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = Arc::clone(&calls);
        let result: ApiResult<()> = retry_with_backoff(RetryPolicy::default(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::rate_limited(2))
            }
        })
        .await;

        assert!(result.unwrap_err().client_side);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_and_timeout_not_retried() {
        for err in [ApiError::from_status(401, None), ApiError::timeout()] {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);
            let expected = err.clone();
            let result: ApiResult<()> = retry_with_backoff(RetryPolicy::default(), move || {
                let counter = Arc::clone(&counter);
                let err = err.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(err)
                }
            })
            .await;
            assert_eq!(result.unwrap_err(), expected);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }
}
