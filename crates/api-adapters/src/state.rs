use std::sync::Arc;
use std::time::{Duration, Instant};

use domains::ports::RateLimiter;
use services::Services;

use crate::metrics::Metrics;

/// Per-IP request budgets. Both share one sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub window: Duration,
    pub general: u32,
    pub auth: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            general: 100,
            auth: 5,
        }
    }
}

/// The slice of process settings the HTTP layer reads.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Reported by `/api/health`.
    pub environment: String,
    /// Marks the remember cookie `Secure` and hides internal error text.
    pub production: bool,
    /// The only origin CORS lets through.
    pub frontend_url: String,
    pub rate_limits: RateLimits,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            production: false,
            frontend_url: "http://localhost:3000".into(),
            rate_limits: RateLimits::default(),
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub limiter: Arc<dyn RateLimiter>,
    pub http: Arc<HttpSettings>,
    pub metrics: Arc<Metrics>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(services: Services, limiter: Arc<dyn RateLimiter>, http: HttpSettings) -> Self {
        Self {
            services,
            limiter,
            http: Arc::new(http),
            metrics: Arc::new(Metrics::new()),
            started_at: Instant::now(),
        }
    }
}
