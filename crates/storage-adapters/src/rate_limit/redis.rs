//! Sliding window on a Redis sorted set: one member per accepted hit,
//! scored by its millisecond timestamp. Shared across every API instance
//! pointed at the same Redis.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Pool, Runtime};
use domains::ports::{RateDecision, RateLimiter};
use domains::{AppError, Result};
use tracing::error;
use uuid::Uuid;

const KEY_PREFIX: &str = "edutrack:ratelimit:";

pub struct RedisRateLimiter {
    pool: Pool,
}

impl RedisRateLimiter {
    pub fn connect(url: &str) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| AppError::Internal(format!("redis pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }
}

fn redis_err(e: impl std::fmt::Display) -> AppError {
    error!(error = %e, "redis rate limiter failed");
    AppError::Internal(format!("redis: {e}"))
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<RateDecision> {
        let mut conn = self.pool.get().await.map_err(redis_err)?;
        let key = format!("{KEY_PREFIX}{key}");
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(e.to_string()))?
            .as_millis() as i64;
        let window_ms = window.as_millis() as i64;
        let member = format!("{now_ms}-{}", Uuid::now_v7());

        let (count,): (u32,) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg(0)
            .arg(now_ms - window_ms)
            .ignore()
            .cmd("ZADD")
            .arg(&key)
            .arg(now_ms)
            .arg(&member)
            .ignore()
            .cmd("ZCARD")
            .arg(&key)
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(window_ms)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;

        if count <= limit {
            return Ok(RateDecision {
                allowed: true,
                limit,
                remaining: limit - count,
                retry_after_secs: 0,
            });
        }

        // Rejected hits do not occupy the window.
        let _: () = conn.zrem(&key, &member).await.map_err(redis_err)?;
        let oldest: Vec<(String, i64)> = conn
            .zrange_withscores(&key, 0, 0)
            .await
            .map_err(redis_err)?;
        let retry_ms = oldest
            .first()
            .map(|(_, score)| (score + window_ms - now_ms).max(0))
            .unwrap_or(window_ms);

        Ok(RateDecision {
            allowed: false,
            limit,
            remaining: 0,
            retry_after_secs: (retry_ms as u64).div_ceil(1000),
        })
    }
}
