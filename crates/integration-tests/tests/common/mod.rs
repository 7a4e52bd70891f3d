//! Shared harness: the full router over in-memory storage, a manual clock
//! and a cheap password hasher, driven with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use api_adapters::{AppState, HttpSettings, RateLimits};
use async_trait::async_trait;
use auth_adapters::{DisabledCaptchaVerifier, JwtIssuer};
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use domains::ports::{ManualClock, PasswordHasher};
use domains::Result;
use serde_json::{json, Value};
use services::{AuthPolicy, Infrastructure, Services};
use storage_adapters::{MemoryCaptchaStore, MemoryRateLimiter, MemoryStore, PngCaptchaRenderer};
use tower::ServiceExt;

/// Stores passwords with a marker prefix; argon2 is too slow for a test loop.
pub struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, password: &str) -> Result<String> {
        Ok(format!("plain${password}"))
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(hash.strip_prefix("plain$") == Some(password))
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub raw: Vec<u8>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limits(RateLimits {
            general: 1_000,
            auth: 1_000,
            ..RateLimits::default()
        })
    }

    pub fn with_limits(rate_limits: RateLimits) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let repos = Arc::new(MemoryStore::new()).repositories();
        let infra = Infrastructure {
            hasher: Arc::new(PlainHasher),
            tokens: Arc::new(JwtIssuer::new(b"integration-test-secret")),
            captcha_store: Arc::new(MemoryCaptchaStore::new()),
            captcha_renderer: Arc::new(PngCaptchaRenderer::new()),
            captcha_verifier: Arc::new(DisabledCaptchaVerifier),
            clock: clock.clone(),
        };
        let policy = AuthPolicy {
            echo_tokens: true,
            ..AuthPolicy::default()
        };
        let services = Services::new(&repos, infra, policy);
        let http = HttpSettings {
            rate_limits,
            ..HttpSettings::default()
        };
        let state = AppState::new(services, Arc::new(MemoryRateLimiter::new()), http);
        Self {
            router: api_adapters::app(state),
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Reply {
            status,
            headers,
            body,
            raw: bytes.to_vec(),
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        self.send(request(Method::PUT, uri, token, Some(body))).await
    }

    /// Registers an account and returns its bearer token.
    pub async fn register(&self, body: Value) -> String {
        let reply = self.post("/api/auth/register", None, body).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["token"]
            .as_str()
            .expect("token in register reply")
            .to_string()
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

fn base_account(first: &str, email: &str, role: &str, role_data: Value) -> Value {
    json!({
        "firstName": first,
        "lastName": "Lovelace",
        "email": email,
        "password": "secret123",
        "confirmPassword": "secret123",
        "phone": "+14155550123",
        "dateOfBirth": "2010-04-12",
        "role": role,
        "address": {
            "street": "12 Analytical Way",
            "city": "London",
            "state": "Greater London",
            "zipCode": "NW1 6XE"
        },
        "roleData": role_data,
        "terms": true,
        "captchaToken": "math-captcha-ok"
    })
}

pub fn student_account(email: &str, class: &str) -> Value {
    base_account(
        "Ada",
        email,
        "student",
        json!({ "grade": "10", "class": class, "section": "A" }),
    )
}

pub fn teacher_account(email: &str) -> Value {
    base_account(
        "Charles",
        email,
        "teacher",
        json!({ "subject": "Mathematics", "qualification": "MSc", "experience": 7 }),
    )
}

pub fn parent_account(email: &str) -> Value {
    base_account("Anne", email, "parent", json!({ "occupation": "Engineer" }))
}

pub fn login_body(email: &str, password: &str, role: &str) -> Value {
    json!({
        "email": email,
        "password": password,
        "role": role,
        "captchaToken": "math-captcha-ok"
    })
}
