use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::Value;
use services::parents::{
    ContactPreferencesRequest, LinkStudentRequest, ParentListQuery, UpdateParentRequest,
};

use super::{keyed, listing, with_message, ApiResult};
use crate::extract::{ApiJson, ApiQuery, AuthUser, IdPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/user/{user_id}", get(by_user))
        .route("/student/{student_id}", get(for_student))
        .route("/emergency-contacts/{student_id}", get(emergency_contacts))
        .route("/{id}", get(show).put(update))
        .route("/{id}/students", post(link_student))
        .route("/{id}/contact-preferences", put(update_contact_preferences))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ParentListQuery>,
) -> ApiResult<Json<Value>> {
    listing("parents", state.services.parents.list(query).await?)
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Json<Value>> {
    keyed("parent", &state.services.parents.get(id).await?)
}

async fn by_user(State(state): State<AppState>, IdPath(user_id): IdPath) -> ApiResult<Json<Value>> {
    keyed("parent", &state.services.parents.get_by_user(user_id).await?)
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<UpdateParentRequest>,
) -> ApiResult<Json<Value>> {
    let parent = state.services.parents.update(&actor, id, req).await?;
    with_message("Parent profile updated successfully", "parent", &parent)
}

async fn link_student(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<LinkStudentRequest>,
) -> ApiResult<Json<Value>> {
    let parent = state.services.parents.link_student(&actor, id, req).await?;
    with_message("Student added successfully", "parent", &parent)
}

async fn update_contact_preferences(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<ContactPreferencesRequest>,
) -> ApiResult<Json<Value>> {
    let prefs = state
        .services
        .parents
        .update_contact_preferences(&actor, id, req)
        .await?;
    with_message(
        "Contact preferences updated successfully",
        "contactPreferences",
        &prefs,
    )
}

async fn for_student(
    State(state): State<AppState>,
    IdPath(student_id): IdPath,
) -> ApiResult<Json<Value>> {
    keyed("parents", &state.services.parents.for_student(student_id).await?)
}

async fn emergency_contacts(
    State(state): State<AppState>,
    IdPath(student_id): IdPath,
) -> ApiResult<Json<Value>> {
    keyed(
        "emergencyContacts",
        &state.services.parents.emergency_contacts(student_id).await?,
    )
}
