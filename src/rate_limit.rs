use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Method;
use tokio::time::Instant;
use tracing::debug;

// Quota for one limiter: max requests allowed inside a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: usize,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const GENERAL: Self = Self::new(10, Duration::from_secs(60));
    pub const AUTH: Self = Self::new(5, Duration::from_secs(15 * 60));
    pub const PAYMENT: Self = Self::new(3, Duration::from_secs(5 * 60));

    pub const fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Rejection returned when a key is over its quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after_secs: u64,
}

/// Sliding-window limiter. Each key keeps the timestamps of its accepted
/// attempts; stale ones are pruned lazily on every check.
///
/// Client-side and advisory only: anything calling the backend directly
/// bypasses it.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    policy: RateLimitPolicy,
    requests: DashMap<String, VecDeque<Instant>>, // key -> accepted attempts, oldest first
}

impl SlidingWindowLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            requests: DashMap::new(),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    // Record an attempt for `key`, or reject it if the window is full
    pub fn check_limit(&self, key: &str) -> Result<(), RateLimited> {
        let now = Instant::now();
        let window = self.policy.window;

        // entry guard holds the shard lock, so prune + check + push is atomic per key
        let mut timestamps = self.requests.entry(key.to_string()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.policy.max_requests {
            let retry_after_secs = match timestamps.front() {
                Some(&oldest) => {
                    let remaining = (oldest + window).saturating_duration_since(now);
                    remaining.as_millis().div_ceil(1000).max(1) as u64
                }
                None => window.as_secs().max(1),
            };
            debug!(key, retry_after_secs, "client-side rate limit hit");
            return Err(RateLimited { retry_after_secs });
        }

        timestamps.push_back(now);
        Ok(())
    }

    pub fn reset(&self, key: &str) {
        self.requests.remove(key);
    }

    pub fn clear(&self) {
        self.requests.clear();
    }

    // Attempts still inside the window for `key`
    pub fn in_window(&self, key: &str) -> usize {
        let now = Instant::now();
        self.requests
            .get(key)
            .map(|ts| {
                ts.iter()
                    .filter(|&&t| now.duration_since(t) < self.policy.window)
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Which limiter guards a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    General,
    Auth,
    Payment,
}

/// The three independent limiters used by the request wrapper.
#[derive(Debug)]
pub struct LimiterSet {
    pub general: SlidingWindowLimiter,
    pub auth: SlidingWindowLimiter,
    pub payment: SlidingWindowLimiter,
}

impl Default for LimiterSet {
    fn default() -> Self {
        Self::new(
            RateLimitPolicy::GENERAL,
            RateLimitPolicy::AUTH,
            RateLimitPolicy::PAYMENT,
        )
    }
}

impl LimiterSet {
    pub fn new(general: RateLimitPolicy, auth: RateLimitPolicy, payment: RateLimitPolicy) -> Self {
        Self {
            general: SlidingWindowLimiter::new(general),
            auth: SlidingWindowLimiter::new(auth),
            payment: SlidingWindowLimiter::new(payment),
        }
    }

    pub fn classify(path: &str) -> EndpointClass {
        let path = path.split('?').next().unwrap_or(path);
        if path.contains("/auth/") || path.ends_with("/auth") {
            EndpointClass::Auth
        } else if path.contains("/payment") {
            EndpointClass::Payment
        } else {
            EndpointClass::General
        }
    }

    pub fn limiter_for(&self, class: EndpointClass) -> &SlidingWindowLimiter {
        match class {
            EndpointClass::General => &self.general,
            EndpointClass::Auth => &self.auth,
            EndpointClass::Payment => &self.payment,
        }
    }

    // Key is "METHOD:path", limiter picked by path class
    pub fn check(&self, method: &Method, path: &str) -> Result<(), RateLimited> {
        let key = format!("{}:{}", method.as_str(), path);
        self.limiter_for(Self::classify(path)).check_limit(&key)
    }

    pub fn clear(&self) {
        self.general.clear();
        self.auth.clear();
        self.payment.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize, window_secs: u64) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(RateLimitPolicy::new(max, Duration::from_secs(window_secs)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_call_past_quota() {
        let limiter = limiter(3, 60);

        for _ in 0..3 {
            assert!(limiter.check_limit("POST:/cart/items").is_ok());
        }

        let rejected = limiter.check_limit("POST:/cart/items").unwrap_err();
        assert_eq!(rejected.retry_after_secs, 60);
        // rejected attempts are not recorded
        assert_eq!(limiter.in_window("POST:/cart/items"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides_from_oldest_call() {
        let limiter = limiter(2, 10);

        assert!(limiter.check_limit("k").is_ok());
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(limiter.check_limit("k").is_ok());

        tokio::time::advance(Duration::from_millis(3500)).await;
        let rejected = limiter.check_limit("k").unwrap_err();
        // oldest expires 2.5s from now, rounded up
        assert_eq!(rejected.retry_after_secs, 3);

        tokio::time::advance(Duration::from_millis(2600)).await;
        assert!(limiter.check_limit("k").is_ok());
        assert!(limiter.check_limit("k").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 60);

        assert!(limiter.check_limit("POST:/orders").is_ok());
        assert!(limiter.check_limit("POST:/orders").is_err());
        assert!(limiter.check_limit("PUT:/orders").is_ok());

        limiter.reset("POST:/orders");
        assert!(limiter.check_limit("POST:/orders").is_ok());
    }

    #[test]
    fn test_classify_paths() {
        assert_eq!(LimiterSet::classify("/auth/login"), EndpointClass::Auth);
        assert_eq!(LimiterSet::classify("/api/auth"), EndpointClass::Auth);
        assert_eq!(
            LimiterSet::classify("/payments/initiate"),
            EndpointClass::Payment
        );
        assert_eq!(LimiterSet::classify("/cart/items"), EndpointClass::General);
        assert_eq!(
            LimiterSet::classify("/products?q=/auth/"),
            EndpointClass::General
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_presets_enforced_per_class() {
        let limiters = LimiterSet::default();

        for _ in 0..3 {
            assert!(limiters.check(&Method::POST, "/payments/initiate").is_ok());
        }
        assert!(limiters.check(&Method::POST, "/payments/initiate").is_err());

        // other classes untouched
        assert!(limiters.check(&Method::POST, "/auth/login").is_ok());
        assert!(limiters.check(&Method::POST, "/cart/items").is_ok());

        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        assert!(limiters.check(&Method::POST, "/payments/initiate").is_ok());
    }
}
