//! `AppError` rendered as HTTP.
//!
//! Every failure leaves as `{"error": <message>}`; field validation adds
//! `details`, a lockout adds `lockUntil`. Internal errors are logged here, the
//! one place they turn into a 500. Their body always carries a generic
//! message; the raw text rides along as an [`InternalDetail`] extension, which
//! only the non-production middleware puts back in front of the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::AppError;
use serde_json::json;

/// Raw text of the internal error behind a 500 response.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

/// Wrapper so handlers can `?` a domain error straight into a response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(AppError::ValidationError(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        status_of(&self.0)
    }
}

pub fn status_of(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(..) => StatusCode::NOT_FOUND,
        AppError::ValidationError(_) | AppError::InvalidFields(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::AccountLocked(_) => StatusCode::LOCKED,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The text a client sees for `err`.
pub fn public_message(err: &AppError) -> String {
    match err {
        AppError::NotFound(entity, _) => format!("{entity} not found"),
        AppError::InvalidFields(_) => "Validation failed".into(),
        AppError::AccountLocked(_) => {
            "Account is temporarily locked due to multiple failed login attempts".into()
        }
        AppError::Internal(_) => "Internal server error".into(),
        AppError::ValidationError(msg)
        | AppError::Unauthorized(msg)
        | AppError::Forbidden(msg)
        | AppError::Conflict(msg)
        | AppError::RateLimitExceeded(msg) => msg.clone(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = public_message(&self.0);
        let (body, detail) = match self.0 {
            AppError::InvalidFields(details) => {
                (json!({ "error": message, "details": details }), None)
            }
            AppError::AccountLocked(until) => {
                (json!({ "error": message, "lockUntil": until }), None)
            }
            AppError::Internal(raw) => {
                tracing::error!(error = %raw, "request failed with an internal error");
                (json!({ "error": message }), Some(InternalDetail(raw)))
            }
            _ => (json!({ "error": message }), None),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(detail);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::FieldError;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = ApiError(err).into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_names_the_entity_only() {
        let (status, body) = body_of(AppError::not_found("Student", "abc")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Student not found");
    }

    #[tokio::test]
    async fn field_errors_carry_details() {
        let err = AppError::InvalidFields(vec![FieldError::new("email", "Invalid email")]);
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"][0]["field"], "email");
        assert_eq!(body["details"][0]["message"], "Invalid email");
    }

    #[tokio::test]
    async fn internal_text_stays_out_of_the_body() {
        let response = ApiError(AppError::Internal("pool timed out".into())).into_response();
        assert_eq!(
            response.extensions().get::<InternalDetail>().map(|d| d.0.as_str()),
            Some("pool timed out")
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn lockout_is_423_with_expiry() {
        let (status, body) = body_of(AppError::AccountLocked(Utc::now())).await;
        assert_eq!(status, StatusCode::LOCKED);
        assert!(body["lockUntil"].is_string());
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(status_of(&AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(&AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(&AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(&AppError::RateLimitExceeded("x".into())),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(&AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
