use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::Value;
use services::users::{ChangePasswordRequest, UpdateUserRequest, UserListQuery};

use super::{keyed, listing, message, with_message, ApiResult};
use crate::extract::{ApiJson, ApiQuery, AuthUser, IdPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show).put(update).delete(deactivate))
        .route("/{id}/password", put(change_password))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<Json<Value>> {
    listing("users", state.services.users.list(query).await?)
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Json<Value>> {
    keyed("user", &state.services.users.get(id).await?)
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<Value>> {
    let user = state.services.users.update(&actor, id, req).await?;
    with_message("Profile updated successfully", "user", &user)
}

async fn change_password(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    state.services.users.change_password(&actor, id, req).await?;
    Ok(message("Password changed successfully"))
}

async fn deactivate(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    state.services.users.deactivate(&actor, id).await?;
    Ok(message("Account deactivated successfully"))
}
