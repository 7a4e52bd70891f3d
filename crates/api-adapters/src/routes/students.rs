use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::Value;
use services::students::{AddParentRequest, MedicalInfoRequest, StudentListQuery, UpdateStudentRequest};

use super::{keyed, listing, with_message, ApiResult};
use crate::extract::{ApiJson, ApiQuery, AuthUser, IdPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/user/{user_id}", get(by_user))
        .route("/{id}", get(show).put(update))
        .route("/{id}/parents", post(add_parent))
        .route("/{id}/medical", put(update_medical))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StudentListQuery>,
) -> ApiResult<Json<Value>> {
    listing("students", state.services.students.list(query).await?)
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Json<Value>> {
    keyed("student", &state.services.students.get(id).await?)
}

async fn by_user(State(state): State<AppState>, IdPath(user_id): IdPath) -> ApiResult<Json<Value>> {
    keyed("student", &state.services.students.get_by_user(user_id).await?)
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<UpdateStudentRequest>,
) -> ApiResult<Json<Value>> {
    let student = state.services.students.update(&actor, id, req).await?;
    with_message("Student profile updated successfully", "student", &student)
}

async fn add_parent(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<AddParentRequest>,
) -> ApiResult<Json<Value>> {
    let student = state.services.students.add_parent(&actor, id, req).await?;
    with_message("Parent added successfully", "student", &student)
}

async fn update_medical(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<MedicalInfoRequest>,
) -> ApiResult<Json<Value>> {
    let medical = state.services.students.update_medical(&actor, id, req).await?;
    with_message("Medical information updated successfully", "medicalInfo", &medical)
}
