//! Services and the HTTP layer against mocked ports, for the failure paths an
//! in-memory backend never takes.

mod common;

use std::sync::Arc;

use api_adapters::{AppState, HttpSettings};
use axum::http::{Method, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use common::{login_body, PlainHasher};
use domains::ports::{
    ManualClock, MockCaptchaRenderer, MockCaptchaStore, MockCaptchaVerifier,
    MockNotificationRepository, MockRateLimiter, MockUserRepository,
};
use domains::AppError;
use mockall::predicate::{always, eq};
use services::captcha::CaptchaService;
use services::notifications::NotificationService;
use services::{AuthPolicy, Infrastructure, Services};
use storage_adapters::{MemoryCaptchaStore, MemoryStore, PngCaptchaRenderer};
use tower::ServiceExt;

fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).single().expect("valid instant"),
    ))
}

#[tokio::test]
async fn third_party_captcha_tokens_go_to_the_verifier() {
    let mut verifier = MockCaptchaVerifier::new();
    verifier
        .expect_verify()
        .with(eq("g-recaptcha-token"), eq(Some("203.0.113.9".to_string())))
        .times(1)
        .returning(|_, _| Ok(false));
    let service = CaptchaService::new(
        Arc::new(MockCaptchaStore::new()),
        Arc::new(MockCaptchaRenderer::new()),
        Arc::new(verifier),
        fixed_clock(),
    );

    let err = service
        .check_token(Some("g-recaptcha-token"), Some("203.0.113.9".into()))
        .await
        .expect_err("rejected token");
    assert!(matches!(err, AppError::ValidationError(ref m) if m == "CAPTCHA verification failed"));
}

#[tokio::test]
async fn math_captcha_tokens_skip_the_verifier() {
    let mut verifier = MockCaptchaVerifier::new();
    verifier.expect_verify().never();
    let service = CaptchaService::new(
        Arc::new(MockCaptchaStore::new()),
        Arc::new(MockCaptchaRenderer::new()),
        Arc::new(verifier),
        fixed_clock(),
    );

    service
        .check_token(Some("math-captcha-1234"), None)
        .await
        .expect("local token accepted");
}

#[tokio::test]
async fn expiry_sweep_passes_the_clock_through() {
    let clock = fixed_clock();
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).single().expect("valid instant");
    let mut repo = MockNotificationRepository::new();
    repo.expect_purge_expired()
        .with(eq(now))
        .times(1)
        .returning(|_| Ok(3));

    let service = NotificationService::new(Arc::new(repo), clock);
    assert_eq!(service.purge_expired().await.expect("sweep"), 3);
}

#[tokio::test]
async fn rate_limiter_outage_lets_requests_through() {
    let mut limiter = MockRateLimiter::new();
    limiter
        .expect_hit()
        .with(eq("general:unknown"), always(), always())
        .returning(|_, _, _| Err(AppError::Internal("redis unavailable".into())));

    let clock = fixed_clock();
    let repos = Arc::new(MemoryStore::new()).repositories();
    let infra = Infrastructure {
        hasher: Arc::new(PlainHasher),
        tokens: Arc::new(auth_adapters::JwtIssuer::new(b"contract-secret")),
        captcha_store: Arc::new(MemoryCaptchaStore::new()),
        captcha_renderer: Arc::new(PngCaptchaRenderer::new()),
        captcha_verifier: Arc::new(auth_adapters::DisabledCaptchaVerifier),
        clock,
    };
    let services = Services::new(&repos, infra, AuthPolicy::default());
    let state = AppState::new(services, Arc::new(limiter), HttpSettings::default());
    let router = api_adapters::app(state);

    let response = router
        .oneshot(common::request(Method::GET, "/api/health", None, None))
        .await
        .expect("router is infallible");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("ratelimit-limit"));
}

fn router_with_failing_users(production: bool) -> Router {
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_email()
        .returning(|_| Err(AppError::Internal("connection pool timed out".into())));

    let mut repos = Arc::new(MemoryStore::new()).repositories();
    repos.users = Arc::new(users);
    let infra = Infrastructure {
        hasher: Arc::new(PlainHasher),
        tokens: Arc::new(auth_adapters::JwtIssuer::new(b"contract-secret")),
        captcha_store: Arc::new(MemoryCaptchaStore::new()),
        captcha_renderer: Arc::new(PngCaptchaRenderer::new()),
        captcha_verifier: Arc::new(auth_adapters::DisabledCaptchaVerifier),
        clock: fixed_clock(),
    };
    let services = Services::new(&repos, infra, AuthPolicy::default());
    let http = HttpSettings {
        production,
        ..HttpSettings::default()
    };
    let limiter = Arc::new(storage_adapters::MemoryRateLimiter::new());
    api_adapters::app(AppState::new(services, limiter, http))
}

async fn failed_login_body(router: Router) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(common::request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(login_body("ada@example.com", "secret123", "student")),
        ))
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn storage_failures_hide_their_text_in_production() {
    let (status, body) = failed_login_body(router_with_failing_users(true)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");

    let (status, body) = failed_login_body(router_with_failing_users(false)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "connection pool timed out");
}
