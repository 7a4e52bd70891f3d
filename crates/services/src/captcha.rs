//! # Captcha
//!
//! Two unrelated checks share this module:
//!
//! * the image challenge served by `GET /api/captcha` and consumed once by
//!   `POST /api/verify-captcha`;
//! * the `captchaToken` gate in front of register and login, which accepts
//!   locally issued `math-captcha-` tokens and defers everything else to the
//!   third-party verifier.

use std::sync::Arc;

use domains::models::{
    CaptchaChallenge, CaptchaImage, CaptchaVerdict, CAPTCHA_ALPHABET, CAPTCHA_LENGTH,
};
use domains::ports::{CaptchaRenderer, CaptchaStore, CaptchaVerifier, Clock};
use domains::{AppError, Result};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::tokens::generate_id;

pub const MATH_CAPTCHA_PREFIX: &str = "math-captcha-";

/// A freshly drawn challenge: the id goes in `X-Captcha-Id`, the image in the body.
#[derive(Debug, Clone)]
pub struct IssuedCaptcha {
    pub id: String,
    pub image: CaptchaImage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyCaptchaRequest {
    pub id: Option<String>,
    pub text: Option<String>,
}

pub struct CaptchaService {
    store: Arc<dyn CaptchaStore>,
    renderer: Arc<dyn CaptchaRenderer>,
    verifier: Arc<dyn CaptchaVerifier>,
    clock: Arc<dyn Clock>,
}

impl CaptchaService {
    pub fn new(
        store: Arc<dyn CaptchaStore>,
        renderer: Arc<dyn CaptchaRenderer>,
        verifier: Arc<dyn CaptchaVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            renderer,
            verifier,
            clock,
        }
    }

    pub async fn issue(&self) -> Result<IssuedCaptcha> {
        let now = self.clock.now();
        let purged = self.store.purge_expired(now).await?;
        if purged > 0 {
            debug!(purged, "dropped expired captcha challenges");
        }

        let text = challenge_text()?;
        let image = self.renderer.render(&text, rand::random())?;
        let id = generate_id()?;
        self.store
            .put(CaptchaChallenge::new(id.clone(), text, now))
            .await?;
        Ok(IssuedCaptcha { id, image })
    }

    /// Consumes the challenge whatever the outcome.
    pub async fn verify(&self, req: VerifyCaptchaRequest) -> Result<CaptchaVerdict> {
        let (Some(id), Some(text)) = (
            req.id.filter(|s| !s.is_empty()),
            req.text.filter(|s| !s.is_empty()),
        ) else {
            return Err(AppError::ValidationError("Missing captcha ID or text".into()));
        };

        let challenge = self
            .store
            .take(&id)
            .await?
            .ok_or_else(|| AppError::not_found("Captcha", &id))?;

        if challenge.is_expired_at(self.clock.now()) {
            return Err(AppError::ValidationError("Captcha expired".into()));
        }
        Ok(if challenge.matches(&text) {
            CaptchaVerdict::Passed
        } else {
            CaptchaVerdict::Mismatch
        })
    }

    /// Gate used by register and login.
    pub async fn check_token(&self, token: Option<&str>, remote_ip: Option<String>) -> Result<()> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => {
                return Err(AppError::ValidationError(
                    "CAPTCHA verification required".into(),
                ))
            }
        };
        if token.starts_with(MATH_CAPTCHA_PREFIX) {
            return Ok(());
        }
        if self.verifier.verify(token, remote_ip).await? {
            Ok(())
        } else {
            warn!("captcha token rejected by verifier");
            Err(AppError::ValidationError("CAPTCHA verification failed".into()))
        }
    }
}

fn challenge_text() -> Result<String> {
    let mut rng = rand::rng();
    (0..CAPTCHA_LENGTH)
        .map(|_| CAPTCHA_ALPHABET.choose(&mut rng).map(|&b| char::from(b)))
        .collect::<Option<String>>()
        .ok_or_else(|| AppError::Internal("captcha alphabet is empty".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use domains::ports::{ManualClock, MockCaptchaRenderer, MockCaptchaStore, MockCaptchaVerifier};

    fn png_stub() -> CaptchaImage {
        CaptchaImage {
            bytes: vec![0x89, b'P', b'N', b'G'].into(),
            content_type: "image/png".parse().unwrap(),
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap(),
        ))
    }

    fn service(
        store: MockCaptchaStore,
        verifier: MockCaptchaVerifier,
        clock: Arc<ManualClock>,
    ) -> CaptchaService {
        let mut renderer = MockCaptchaRenderer::new();
        renderer.expect_render().returning(|_, _| Ok(png_stub()));
        CaptchaService::new(Arc::new(store), Arc::new(renderer), Arc::new(verifier), clock)
    }

    #[test]
    fn challenge_text_uses_only_unambiguous_symbols() {
        for _ in 0..50 {
            let text = challenge_text().unwrap();
            assert_eq!(text.len(), CAPTCHA_LENGTH);
            assert!(text.bytes().all(|b| CAPTCHA_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn issue_stores_a_six_char_challenge() {
        let mut store = MockCaptchaStore::new();
        store.expect_purge_expired().returning(|_| Ok(0));
        store
            .expect_put()
            .withf(|c| {
                c.text.len() == 6 && c.text.bytes().all(|b| CAPTCHA_ALPHABET.contains(&b))
            })
            .times(1)
            .returning(|_| Ok(()));
        let svc = service(store, MockCaptchaVerifier::new(), clock());

        let issued = svc.issue().await.unwrap();
        assert_eq!(issued.id.len(), 32);
        assert_eq!(issued.image.content_type.essence_str(), "image/png");
    }

    #[tokio::test]
    async fn verify_is_case_insensitive_and_rejects_expired() {
        let clock = clock();
        let now = clock.now();
        let mut store = MockCaptchaStore::new();
        store.expect_take().returning(move |id| {
            Ok(match id {
                "fresh" => Some(CaptchaChallenge::new(id.into(), "AB3XYZ".into(), now)),
                "stale" => Some(CaptchaChallenge::new(
                    id.into(),
                    "AB3XYZ".into(),
                    now - Duration::minutes(6),
                )),
                _ => None,
            })
        });
        let svc = service(store, MockCaptchaVerifier::new(), clock);

        let req = |id: &str, text: &str| VerifyCaptchaRequest {
            id: Some(id.into()),
            text: Some(text.into()),
        };
        assert_eq!(svc.verify(req("fresh", "ab3xyz")).await.unwrap(), CaptchaVerdict::Passed);
        assert_eq!(svc.verify(req("fresh", "zzzzzz")).await.unwrap(), CaptchaVerdict::Mismatch);
        assert!(matches!(
            svc.verify(req("stale", "AB3XYZ")).await,
            Err(AppError::ValidationError(m)) if m == "Captcha expired"
        ));
        assert!(matches!(svc.verify(req("gone", "x")).await, Err(AppError::NotFound(..))));
        assert!(matches!(
            svc.verify(VerifyCaptchaRequest::default()).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn token_gate() {
        let mut verifier = MockCaptchaVerifier::new();
        verifier
            .expect_verify()
            .returning(|token, _| Ok(token == "good-recaptcha"));
        let svc = service(MockCaptchaStore::new(), verifier, clock());

        assert!(svc.check_token(Some("math-captcha-42"), None).await.is_ok());
        assert!(svc.check_token(Some("good-recaptcha"), None).await.is_ok());
        assert!(matches!(
            svc.check_token(Some("bad"), None).await,
            Err(AppError::ValidationError(m)) if m == "CAPTCHA verification failed"
        ));
        assert!(matches!(
            svc.check_token(None, None).await,
            Err(AppError::ValidationError(m)) if m == "CAPTCHA verification required"
        ));
    }
}
