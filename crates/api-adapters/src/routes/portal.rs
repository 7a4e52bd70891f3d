//! The student's own view: `/api/students/{dashboard,attendance,...}`.
//! Every handler resolves the caller's student profile; other roles get 403.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use services::portal::{AssignmentQuery, AttendanceQuery, SubmitAssignmentRequest};

use super::{with_message, ApiResult};
use crate::extract::{ApiJson, ApiQuery, AuthUser, IdPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/attendance", get(attendance))
        .route("/assignments", get(assignments))
        .route("/assignments/{id}/submit", post(submit))
        .route("/results", get(results))
        .route("/schedule", get(schedule))
}

async fn dashboard(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.portal.dashboard(&actor).await?))
}

async fn attendance(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(query): ApiQuery<AttendanceQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.portal.attendance(&actor, query).await?))
}

async fn assignments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(query): ApiQuery<AssignmentQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.portal.assignments(&actor, query).await?))
}

async fn results(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.portal.results(&actor).await?))
}

async fn schedule(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.portal.schedule(&actor).await?))
}

async fn submit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<SubmitAssignmentRequest>,
) -> ApiResult<Json<Value>> {
    let submission = state.services.portal.submit(&actor, id, req).await?;
    with_message("Assignment submitted successfully", "submission", &submission)
}
