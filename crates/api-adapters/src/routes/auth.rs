//! `/api/auth/*`: registration, login, session restore and the token flows.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use domains::AppError;
use serde::Deserialize;
use serde_json::{json, Value};
use services::auth::{
    AuthSession, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
};

use super::{message, ApiResult};
use crate::error::ApiError;
use crate::extract::{bearer_token, cookie, ApiJson, AuthUser, ClientIp};
use crate::metrics::AuthOutcome;
use crate::state::AppState;

pub const REMEMBER_COOKIE: &str = "rememberToken";
const REMEMBER_MAX_AGE_SECS: u32 = 30 * 24 * 60 * 60;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/remember", post(remember))
        .route("/auth/verify-email/{token}", get(verify_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/resend-verification", post(resend_verification))
}

fn remember_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{REMEMBER_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={REMEMBER_MAX_AGE_SECS}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn session_body(text: &str, session: &AuthSession) -> ApiResult<Value> {
    let mut body = serde_json::to_value(session).map_err(|e| ApiError(e.into()))?;
    if let Value::Object(map) = &mut body {
        map.insert("message".into(), text.into());
    }
    Ok(body)
}

/// Attaches the remember cookie when the session carries a token.
fn with_session(
    state: &AppState,
    status: StatusCode,
    text: &str,
    session: AuthSession,
) -> ApiResult<Response> {
    let body = session_body(text, &session)?;
    let mut response = (status, Json(body)).into_response();
    if let Some(token) = &session.remember_token {
        let value = HeaderValue::from_str(&remember_cookie(token, state.http.production))
            .map_err(|e| ApiError(AppError::Internal(format!("cookie header: {e}"))))?;
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(response)
}

async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<Response> {
    let session = state.services.auth.register(req, ip).await?;
    with_session(&state, StatusCode::CREATED, "Registration successful", session)
}

async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Response> {
    match state.services.auth.login(req, ip).await {
        Ok(session) => {
            state.metrics.record_login(AuthOutcome::Success);
            with_session(&state, StatusCode::OK, "Login successful", session)
        }
        Err(err) => {
            match err {
                AppError::AccountLocked(_) => state.metrics.record_login(AuthOutcome::Lockout),
                AppError::Unauthorized(_) => state.metrics.record_login(AuthOutcome::Failure),
                _ => {}
            }
            Err(err.into())
        }
    }
}

/// Always succeeds; a valid bearer token also revokes the stored remember token.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let actor = match bearer_token(&headers) {
        Some(token) => state.services.auth.authenticate(token).await.ok(),
        None => None,
    };
    state.services.auth.logout(actor.as_ref()).await?;

    let mut response = message("Logout successful").into_response();
    response.headers_mut().append(
        header::SET_COOKIE,
        HeaderValue::from_static("rememberToken=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RememberRequest {
    remember_token: Option<String>,
}

/// Cookie first, then an optional `{"rememberToken"}` body.
async fn remember(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RememberRequest>(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?
            .remember_token
    };
    let token = cookie(&headers, REMEMBER_COOKIE)
        .map(str::to_string)
        .or(from_body)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError(AppError::Unauthorized("Remember token required".into())))?;

    let session = state.services.auth.restore_session(&token).await?;
    with_session(&state, StatusCode::OK, "Session restored", session)
}

async fn me(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<impl IntoResponse> {
    let current = state.services.auth.me(&actor).await?;
    Ok(Json(current))
}

async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<Value>> {
    state.services.auth.verify_email(&token).await?;
    Ok(message("Email verified successfully"))
}

async fn resend_verification(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<Value>> {
    let token = state.services.auth.resend_verification(&actor).await?;
    Ok(Json(match token {
        Some(token) => json!({ "message": "Verification email sent", "verificationToken": token }),
        None => json!({ "message": "Verification email sent" }),
    }))
}

async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let text = "If the email exists, a password reset link has been sent";
    let token = state.services.auth.forgot_password(req).await?;
    Ok(Json(match token {
        Some(token) => json!({ "message": text, "resetToken": token }),
        None => json!({ "message": text }),
    }))
}

async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    state.services.auth.reset_password(req).await?;
    Ok(message("Password reset successful"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_cookie_attributes() {
        let dev = remember_cookie("abc", false);
        assert!(dev.starts_with("rememberToken=abc;"));
        assert!(dev.contains("HttpOnly"));
        assert!(dev.contains("SameSite=Lax"));
        assert!(dev.contains("Max-Age=2592000"));
        assert!(!dev.contains("Secure"));
        assert!(remember_cookie("abc", true).ends_with("; Secure"));
    }
}
