//! # Metrics
//!
//! A `prometheus-client` registry served as text at `GET /metrics`.

use std::fmt::Write;

use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue, LabelValueEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use crate::state::AppState;

const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    /// `2xx`, `4xx`, ...
    pub status: String,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Failure,
    Lockout,
}

impl AuthOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthOutcome::Success => "success",
            AuthOutcome::Failure => "failure",
            AuthOutcome::Lockout => "lockout",
        }
    }
}

impl EncodeLabelValue for AuthOutcome {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), std::fmt::Error> {
        encoder.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AuthLabels {
    pub outcome: AuthOutcome,
}

pub struct Metrics {
    registry: Registry,
    http_requests: Family<HttpLabels, Counter>,
    logins: Family<AuthLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("edutrack");
        let http_requests = Family::<HttpLabels, Counter>::default();
        let logins = Family::<AuthLabels, Counter>::default();
        registry.register(
            "http_requests",
            "HTTP requests by method and status class",
            http_requests.clone(),
        );
        registry.register("logins", "Login attempts by outcome", logins.clone());
        Self {
            registry,
            http_requests,
            logins,
        }
    }

    pub fn record_request(&self, method: &Method, status: StatusCode) {
        let labels = HttpLabels {
            method: method.as_str().to_string(),
            status: format!("{}xx", status.as_u16() / 100),
        };
        self.http_requests.get_or_create(&labels).inc();
    }

    pub fn record_login(&self, outcome: AuthOutcome) {
        self.logins.get_or_create(&AuthLabels { outcome }).inc();
    }

    pub fn login_count(&self, outcome: AuthOutcome) -> u64 {
        self.logins.get_or_create(&AuthLabels { outcome }).get()
    }

    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        prometheus_client::encoding::text::encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

pub async fn export(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
