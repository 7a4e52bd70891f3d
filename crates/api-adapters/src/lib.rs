//! # api-adapters
//!
//! The HTTP face of EduTrack. Everything here translates between axum and the
//! service layer: extractors turn requests into service DTOs and an
//! [`Actor`](services::Actor), [`error::ApiError`] turns `AppError` into a
//! status code plus JSON body, and the middleware stack adds rate limiting,
//! request ids, tracing, CORS, compression and metrics.
//!
//! The whole crate sits behind the `web-axum` feature so the binary can be
//! compiled against another web stack without pulling axum in.

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod metrics;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
pub mod routes;
#[cfg(feature = "web-axum")]
pub mod state;

#[cfg(feature = "web-axum")]
pub use error::{ApiError, InternalDetail};
#[cfg(feature = "web-axum")]
pub use metrics::Metrics;
#[cfg(feature = "web-axum")]
pub use routes::app;
#[cfg(feature = "web-axum")]
pub use state::{AppState, HttpSettings, RateLimits};
