//! Request middleware: bearer authentication, per-IP rate limiting, request
//! counting and development-only error detail.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::ports::RateDecision;
use domains::AppError;
use serde_json::json;
use tracing::warn;

use crate::error::{ApiError, InternalDetail};
use crate::extract::{bearer_token, client_ip};
use crate::state::AppState;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");

/// Resolves the bearer token to an [`services::Actor`] in the request extensions.
pub async fn auth_required(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| ApiError(AppError::Unauthorized("Access token required".into())))?;
    let actor = state.services.auth.authenticate(token).await?;
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// General budget on `/api/*`, plus the stricter one on `/api/auth/*`.
///
/// Keys come from [`client_ip`], so the limits only hold per client when a
/// trusted proxy in front of the API sets `X-Forwarded-For`.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if !path.starts_with("/api/") {
        return next.run(req).await;
    }
    let is_auth = path.starts_with("/api/auth/");
    let ip = client_ip(
        req.headers(),
        req.extensions().get::<ConnectInfo<SocketAddr>>(),
    )
    .unwrap_or_else(|| "unknown".into());

    let limits = state.http.rate_limits;
    let mut checks = vec![(format!("general:{ip}"), limits.general)];
    if is_auth {
        checks.push((format!("auth:{ip}"), limits.auth));
    }

    let mut last: Option<RateDecision> = None;
    for (key, limit) in checks {
        match state.limiter.hit(&key, limit, limits.window).await {
            Ok(decision) if !decision.allowed => {
                warn!(%ip, key = %key, "rate limit exceeded");
                return too_many_requests(decision, key.starts_with("auth:"));
            }
            Ok(decision) => last = Some(decision),
            // Fails open.
            Err(err) => warn!(error = %err, "rate limiter unavailable; request let through"),
        }
    }

    let mut response = next.run(req).await;
    if let Some(decision) = last {
        set_budget_headers(&mut response, &decision);
    }
    response
}

fn too_many_requests(decision: RateDecision, auth_budget: bool) -> Response {
    let message = if auth_budget {
        "Too many authentication attempts, please try again later."
    } else {
        "Too many requests from this IP, please try again later."
    };
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": message })),
    )
        .into_response();
    set_budget_headers(&mut response, &decision);
    response.headers_mut().insert(
        axum::http::header::RETRY_AFTER,
        HeaderValue::from(decision.retry_after_secs.max(1)),
    );
    response
}

fn set_budget_headers(response: &mut Response, decision: &RateDecision) {
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
}

/// Counts every response by method and status class.
pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;
    state.metrics.record_request(&method, response.status());
    response
}

/// Outside production, swaps the generic 500 body for the underlying message.
pub async fn internal_error_detail(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if state.http.production {
        return response;
    }
    match response.extensions().get::<InternalDetail>().cloned() {
        Some(InternalDetail(raw)) => {
            (response.status(), Json(json!({ "error": raw }))).into_response()
        }
        None => response,
    }
}
