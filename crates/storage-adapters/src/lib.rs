//! # storage-adapters
//!
//! Persistence and stateful infrastructure behind the `domains` ports:
//!
//! - [`memory::MemoryStore`]: every repository in process, backed by `dashmap`.
//! - `postgres::PgStore` (feature `db-postgres`): the same repositories on PostgreSQL.
//! - [`rate_limit`]: sliding-window limiters, in memory or on Redis (feature `redis`).
//! - [`captcha`]: the challenge store and the PNG renderer.

pub mod captcha;
pub mod memory;
pub mod rate_limit;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use captcha::{MemoryCaptchaStore, PngCaptchaRenderer};
pub use memory::MemoryStore;
pub use rate_limit::MemoryRateLimiter;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;

#[cfg(feature = "redis")]
pub use rate_limit::RedisRateLimiter;
