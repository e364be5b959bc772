use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::time::sleep;

/// Global token-bucket rate limiter, shared process-wide per SPEC_FULL.md
/// §5 ("The rate-limit bucket ... [is a] process-wide [singleton]").
///
/// Two independent mechanisms gate outbound requests:
/// - a classic token bucket refilling at `rate_per_sec` up to `burst`;
/// - an upstream-reported `error_limit_remaining` budget that, once below a
///   safety margin, suspends all new requests until the reset horizon the
///   upstream API reports in response headers.
#[derive(Debug)]
pub struct RateLimiter {
    inner: Mutex<Bucket>,
    rate_per_sec: f64,
    burst: f64,
    safety_margin: u32,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    error_limit_remaining: Option<u32>,
    suspended_until: Option<Instant>,
}

impl RateLimiter {
    pub fn new(rate_per_sec: f64, burst: f64, safety_margin: u32) -> Self {
        Self {
            inner: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
                error_limit_remaining: None,
                suspended_until: None,
            }),
            rate_per_sec,
            burst,
            safety_margin,
        }
    }

    /// Acquire a single request slot, waiting as long as necessary. This is
    /// one of the suspension points named in §5 ("Waiting on a rate-limit
    /// token").
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.inner.lock();

                if let Some(until) = bucket.suspended_until {
                    if Instant::now() < until {
                        Some(until - Instant::now())
                    } else {
                        bucket.suspended_until = None;
                        None
                    }
                } else {
                    self.refill(&mut bucket);
                    if bucket.tokens >= 1.0 {
                        bucket.tokens -= 1.0;
                        None
                    } else {
                        let deficit = 1.0 - bucket.tokens;
                        Some(Duration::from_secs_f64(deficit / self.rate_per_sec))
                    }
                }
            };

            match wait {
                None => return,
                Some(duration) => sleep(duration.max(Duration::from_millis(1))).await,
            }
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
        bucket.last_refill = now;
    }

    /// Record the `error_limit_remaining` and reset-horizon headers from the
    /// most recent response. When remaining drops below the configured
    /// safety margin, new requests suspend until `reset_at`.
    pub fn observe_error_budget(&self, remaining: u32, reset_at: Instant) {
        let mut bucket = self.inner.lock();
        bucket.error_limit_remaining = Some(remaining);
        if remaining < self.safety_margin {
            bucket.suspended_until = Some(reset_at);
        }
    }

    pub fn error_budget_remaining(&self) -> Option<u32> {
        self.inner.lock().error_limit_remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    #[tokio::test(start_paused = true)]
    async fn acquire_drains_burst_immediately_then_waits() {
        let limiter = Arc::new(RateLimiter::new(1.0, 2.0, 0));
        limiter.acquire().await;
        limiter.acquire().await;

        let start = tokio::time::Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= StdDuration::from_millis(900));
    }

    #[test]
    fn error_budget_below_margin_suspends_requests() {
        let limiter = RateLimiter::new(100.0, 100.0, 10);
        limiter.observe_error_budget(5, Instant::now() + Duration::from_secs(60));
        assert_eq!(limiter.error_budget_remaining(), Some(5));
    }
}
