//! Per-integration rate limiting: a minimum-interval gate rather than a
//! token bucket, since every catalog client here issues requests one at a
//! time and waits for the response before issuing the next.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn per_second(requests_per_second: f64) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / requests_per_second))
    }

    pub fn per_minute(requests_per_minute: f64) -> Self {
        Self::new(Duration::from_secs_f64(60.0 / requests_per_minute))
    }

    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Blocks until at least `min_interval` has elapsed since the previous
    /// call returned, then records this call's time.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Fraction of the interval already elapsed since the last request, in
    /// [0, 1] — reported as `integration_rate_limit_tokens` (1.0 = fully
    /// available, 0.0 = just consumed).
    pub async fn tokens_remaining(&self) -> f64 {
        let last = self.last_request.lock().await;
        match *last {
            None => 1.0,
            Some(last_time) => {
                let elapsed = last_time.elapsed().as_secs_f64();
                let interval = self.min_interval.as_secs_f64();
                (elapsed / interval).min(1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_for_interval() {
        let limiter = RateLimiter::per_second(20.0); // 50ms interval
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn fresh_limiter_has_full_tokens() {
        let limiter = RateLimiter::per_minute(10.0);
        assert_eq!(limiter.tokens_remaining().await, 1.0);
    }
}
