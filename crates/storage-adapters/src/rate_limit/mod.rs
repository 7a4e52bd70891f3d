//! # Rate limiting
//!
//! Sliding-window limiters behind the [`RateLimiter`] port. A hit counts
//! against the window only when it is allowed, so a client that backs off
//! regains capacity as soon as its oldest accepted hit ages out.

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use self::redis::RedisRateLimiter;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::ports::{RateDecision, RateLimiter};
use domains::Result;

/// Accepted hit timestamps per key, held in process.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn hit_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateDecision {
        let mut hits = self.windows.entry(key.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= window)
        {
            hits.pop_front();
        }

        if (hits.len() as u32) < limit {
            hits.push_back(now);
            return RateDecision {
                allowed: true,
                limit,
                remaining: limit - hits.len() as u32,
                retry_after_secs: 0,
            };
        }

        let retry_after = hits
            .front()
            .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(window);
        RateDecision {
            allowed: false,
            limit,
            remaining: 0,
            retry_after_secs: retry_after.as_secs_f64().ceil() as u64,
        }
    }

    /// Drops keys whose every hit has left `window`.
    pub fn sweep(&self, window: Duration) {
        let now = Instant::now();
        self.windows.retain(|_, hits| {
            hits.back()
                .is_some_and(|&t| now.saturating_duration_since(t) < window)
        });
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<RateDecision> {
        Ok(self.hit_at(key, limit, window, Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(900);

    #[test]
    fn blocks_after_limit_and_reports_retry_after() {
        let limiter = MemoryRateLimiter::new();
        let t0 = Instant::now();
        for i in 0..5 {
            let d = limiter.hit_at("login:1.2.3.4", 5, WINDOW, t0 + Duration::from_secs(i));
            assert!(d.allowed);
            assert_eq!(d.remaining, 4 - i as u32);
        }
        let blocked = limiter.hit_at("login:1.2.3.4", 5, WINDOW, t0 + Duration::from_secs(60));
        assert!(!blocked.allowed);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.retry_after_secs, 840);
    }

    #[test]
    fn window_slides_and_keys_are_independent() {
        let limiter = MemoryRateLimiter::new();
        let t0 = Instant::now();
        assert!(limiter.hit_at("a", 1, WINDOW, t0).allowed);
        assert!(!limiter.hit_at("a", 1, WINDOW, t0 + Duration::from_secs(1)).allowed);
        assert!(limiter.hit_at("b", 1, WINDOW, t0 + Duration::from_secs(1)).allowed);
        assert!(limiter.hit_at("a", 1, WINDOW, t0 + WINDOW).allowed);
    }

    #[tokio::test]
    async fn port_hit_counts_down() {
        let limiter = MemoryRateLimiter::new();
        let first = limiter.hit("api:ip", 100, WINDOW).await.unwrap();
        assert_eq!(first.remaining, 99);
        limiter.sweep(WINDOW);
        let second = limiter.hit("api:ip", 100, WINDOW).await.unwrap();
        assert_eq!(second.remaining, 98);
    }
}
