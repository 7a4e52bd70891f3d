use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use services::teachers::{
    AssignClassesRequest, PerformanceRatingRequest, TeacherListQuery, UpdateTeacherRequest,
};

use super::{keyed, listing, with_message, ApiResult};
use crate::extract::{ApiJson, ApiQuery, AuthUser, IdPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/department/{department}", get(by_department))
        .route("/subject/{subject}", get(by_subject))
        .route("/user/{user_id}", get(by_user))
        .route("/{id}", get(show).put(update))
        .route("/{id}/performance", post(add_rating))
        .route("/{id}/classes", post(assign_classes))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TeacherListQuery>,
) -> ApiResult<Json<Value>> {
    listing("teachers", state.services.teachers.list(query).await?)
}

async fn by_department(
    State(state): State<AppState>,
    Path(department): Path<String>,
) -> ApiResult<Json<Value>> {
    keyed("teachers", &state.services.teachers.by_department(&department).await?)
}

async fn by_subject(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> ApiResult<Json<Value>> {
    keyed("teachers", &state.services.teachers.by_subject(&subject).await?)
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Json<Value>> {
    keyed("teacher", &state.services.teachers.get(id).await?)
}

async fn by_user(State(state): State<AppState>, IdPath(user_id): IdPath) -> ApiResult<Json<Value>> {
    keyed("teacher", &state.services.teachers.get_by_user(user_id).await?)
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<UpdateTeacherRequest>,
) -> ApiResult<Json<Value>> {
    let teacher = state.services.teachers.update(&actor, id, req).await?;
    with_message("Teacher profile updated successfully", "teacher", &teacher)
}

async fn add_rating(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<PerformanceRatingRequest>,
) -> ApiResult<Json<Value>> {
    let rating = state
        .services
        .teachers
        .add_performance_rating(&actor, id, req)
        .await?;
    with_message("Performance rating added successfully", "rating", &rating)
}

async fn assign_classes(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<AssignClassesRequest>,
) -> ApiResult<Json<Value>> {
    let classes = state.services.teachers.assign_classes(&actor, id, req).await?;
    with_message("Classes assigned successfully", "assignedClasses", &classes)
}
