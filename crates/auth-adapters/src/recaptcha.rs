//! Google reCAPTCHA `siteverify` client.

use std::time::Duration;

use async_trait::async_trait;
use domains::ports::CaptchaVerifier;
use domains::{AppError, Result};
use serde::Deserialize;
use tracing::{debug, error};

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    endpoint: String,
}

impl RecaptchaVerifier {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            secret: secret.into(),
            endpoint: SITEVERIFY_URL.to_string(),
        })
    }

    /// Points the client at a different verification endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<String>) -> Result<bool> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip.as_deref() {
            form.push(("remoteip", ip));
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "reCAPTCHA request failed");
                AppError::Internal(format!("reCAPTCHA request failed: {e}"))
            })?;
        if !resp.status().is_success() {
            return Err(AppError::Internal(format!(
                "reCAPTCHA returned {}",
                resp.status()
            )));
        }

        let body: SiteVerifyResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("reCAPTCHA response parse failed: {e}")))?;
        if !body.success {
            debug!(codes = ?body.error_codes, "reCAPTCHA rejected token");
        }
        Ok(body.success)
    }
}
