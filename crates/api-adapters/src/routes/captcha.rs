//! The image challenge. Unlike the rest of the API its verify endpoint always
//! answers `{success, message}`, errors included.

use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use domains::models::CaptchaVerdict;
use domains::AppError;
use serde_json::json;
use services::captcha::VerifyCaptchaRequest;

use super::ApiResult;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

pub const CAPTCHA_ID_HEADER: &str = "x-captcha-id";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/captcha", get(issue))
        .route("/verify-captcha", post(verify))
}

async fn issue(State(state): State<AppState>) -> ApiResult<Response> {
    let captcha = state.services.captcha.issue().await?;
    let id = HeaderValue::from_str(&captcha.id)
        .map_err(|e| ApiError(AppError::Internal(format!("captcha id header: {e}"))))?;
    let content_type = HeaderValue::from_str(captcha.image.content_type.as_ref())
        .map_err(|e| ApiError(AppError::Internal(format!("content type header: {e}"))))?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
            (HeaderName::from_static(CAPTCHA_ID_HEADER), id),
        ],
        captcha.image.bytes,
    )
        .into_response())
}

async fn verify(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyCaptchaRequest>,
) -> Response {
    match state.services.captcha.verify(req).await {
        Ok(CaptchaVerdict::Passed) => {
            Json(json!({ "success": true, "message": "CAPTCHA verified" })).into_response()
        }
        Ok(CaptchaVerdict::Mismatch) => {
            Json(json!({ "success": false, "message": "Incorrect CAPTCHA" })).into_response()
        }
        Err(AppError::NotFound(..)) => failure(StatusCode::NOT_FOUND, "Captcha not found or expired"),
        Err(AppError::ValidationError(msg)) => failure(StatusCode::BAD_REQUEST, &msg),
        Err(other) => ApiError(other).into_response(),
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}
