//! HS256 bearer tokens carrying `{userId, email, role, iat, exp}`.

use chrono::{Duration, Utc};
use domains::models::{Role, SessionClaims};
use domains::ports::TokenIssuer;
use domains::{AppError, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: Uuid,
    email: String,
    role: Role,
    iat: i64,
    exp: i64,
}

pub struct JwtIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtIssuer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, claims: &SessionClaims, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let body = Claims {
            user_id: claims.user_id,
            email: claims.email.clone(),
            role: claims.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &body, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing: {e}")))
    }

    fn verify(&self, token: &str) -> Result<SessionClaims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;
        Ok(SessionClaims {
            user_id: data.claims.user_id,
            email: data.claims.email,
            role: data.claims.role,
        })
    }
}
