//! Image captcha challenges.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

/// Characters that cannot be confused with each other when drawn
/// (no I, O, 0 or 1).
pub const CAPTCHA_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CAPTCHA_LENGTH: usize = 6;
pub const CAPTCHA_WIDTH: u32 = 200;
pub const CAPTCHA_HEIGHT: u32 = 80;

pub fn captcha_ttl() -> Duration {
    Duration::minutes(5)
}

/// A stored challenge awaiting its single verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    /// 32 hex chars, sent to the client in `X-Captcha-Id`.
    pub id: String,
    pub text: String,
    pub expires_at: DateTime<Utc>,
}

impl CaptchaChallenge {
    pub fn new(id: String, text: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            expires_at: now + captcha_ttl(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn matches(&self, attempt: &str) -> bool {
        self.text.eq_ignore_ascii_case(attempt.trim())
    }
}

/// Encoded challenge image ready to send.
#[derive(Debug, Clone)]
pub struct CaptchaImage {
    pub bytes: Bytes,
    pub content_type: mime::Mime,
}

/// Outcome of `POST /api/verify-captcha`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaVerdict {
    Passed,
    Mismatch,
}
