//! # auth-adapters
//!
//! Credential adapters: Argon2 password hashing (always compiled), HS256
//! bearer tokens (`auth-jwt`) and reCAPTCHA `siteverify` (`recaptcha`).

mod password;

#[cfg(feature = "auth-jwt")]
mod jwt;

#[cfg(feature = "recaptcha")]
mod recaptcha;

pub use password::Argon2Hasher;

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtIssuer;

#[cfg(feature = "recaptcha")]
pub use recaptcha::RecaptchaVerifier;

use async_trait::async_trait;
use domains::ports::CaptchaVerifier;
use domains::Result;
use tracing::warn;

/// Used when no third-party verifier is configured: only the local
/// `math-captcha-` shortcut can pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCaptchaVerifier;

#[async_trait]
impl CaptchaVerifier for DisabledCaptchaVerifier {
    async fn verify(&self, _token: &str, remote_ip: Option<String>) -> Result<bool> {
        warn!(ip = ?remote_ip, "third-party captcha token received but no verifier is configured");
        Ok(false)
    }
}
