//! Rate limiting implementation
//!
//! Uses the governor crate for token bucket rate limiting.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second; fractional rates are allowed
    /// (0.5 means one request every two seconds)
    pub requests_per_second: f64,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst_size: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a config from a request rate, sizing the burst to one
    /// second's worth of requests
    pub fn new(requests_per_second: f64) -> Self {
        let burst_size = requests_per_second.ceil().max(1.0) as u32;
        Self {
            requests_per_second,
            burst_size,
        }
    }

    /// Create a config with an explicit burst size
    pub fn with_burst(requests_per_second: f64, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let rps = if config.requests_per_second.is_finite() && config.requests_per_second > 0.0 {
            config.requests_per_second
        } else {
            1.0
        };

        // governor expresses a quota as the minimum interval between cells
        let interval = Duration::from_secs_f64(1.0 / rps);
        let one = NonZeroU32::new(1).unwrap();
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(one))
            .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(one));

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Create a rate limiter with default settings
    pub fn default_limiter() -> Self {
        Self::new(&RateLimiterConfig::default())
    }

    /// Wait until a request can be made (blocks)
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Wait with a timeout
    pub async fn wait_with_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.limiter.until_ready())
            .await
            .is_ok()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::default_limiter()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert!((config.requests_per_second - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.burst_size, 10);
    }

    #[test]
    fn test_rate_limiter_config_sizes_burst_from_rate() {
        let config = RateLimiterConfig::new(50.0);
        assert_eq!(config.burst_size, 50);

        // Fractional rates still grant a single slot
        let config = RateLimiterConfig::new(0.5);
        assert_eq!(config.burst_size, 1);
    }

    #[test]
    fn test_rate_limiter_config_with_burst() {
        let config = RateLimiterConfig::with_burst(50.0, 25);
        assert!((config.requests_per_second - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.burst_size, 25);
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst() {
        let limiter = RateLimiter::new(&RateLimiterConfig::with_burst(10.0, 5));

        // Should allow burst of 5 requests immediately
        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
    }

    #[tokio::test]
    async fn test_rate_limiter_wait() {
        let limiter = RateLimiter::new(&RateLimiterConfig::with_burst(100.0, 10));

        // Should complete without blocking (within burst)
        limiter.wait().await;
    }

    #[tokio::test]
    async fn test_rate_limiter_wait_with_timeout() {
        let limiter = RateLimiter::new(&RateLimiterConfig::with_burst(100.0, 10));

        // Should succeed within timeout
        let result = limiter.wait_with_timeout(Duration::from_millis(100)).await;
        assert!(result);
    }

    #[tokio::test]
    async fn test_rate_limiter_handles_zero_rate() {
        // A zero rate would be an unusable quota; it falls back to 1 rps
        let limiter = RateLimiter::new(&RateLimiterConfig::with_burst(0.0, 1));
        assert!(limiter.try_acquire());
    }
}
