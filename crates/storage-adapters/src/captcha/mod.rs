//! # Captcha adapters
//!
//! [`MemoryCaptchaStore`] keeps pending challenges in process; a challenge
//! leaves the map the first time it is taken, whether or not the answer
//! matched. [`PngCaptchaRenderer`] draws the challenge text.

mod font;
mod render;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domains::models::CaptchaChallenge;
use domains::ports::CaptchaStore;
use domains::Result;

pub use render::PngCaptchaRenderer;

#[derive(Default)]
pub struct MemoryCaptchaStore {
    pending: DashMap<String, CaptchaChallenge>,
}

impl MemoryCaptchaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[async_trait]
impl CaptchaStore for MemoryCaptchaStore {
    async fn put(&self, challenge: CaptchaChallenge) -> Result<()> {
        self.pending.insert(challenge.id.clone(), challenge);
        Ok(())
    }

    async fn take(&self, id: &str) -> Result<Option<CaptchaChallenge>> {
        Ok(self.pending.remove(id).map(|(_, c)| c))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        self.pending.retain(|_, c| {
            let keep = !c.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
