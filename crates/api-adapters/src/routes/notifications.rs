use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use services::notifications::NotificationListQuery;

use super::{keyed, listing, ApiResult};
use crate::extract::{ApiQuery, AuthUser, IdPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/{id}/read", post(mark_read))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(query): ApiQuery<NotificationListQuery>,
) -> ApiResult<Json<Value>> {
    listing(
        "notifications",
        state.services.notifications.list(&actor, query).await?,
    )
}

async fn unread_count(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.notifications.unread_count(&actor).await?))
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    keyed(
        "notification",
        &state.services.notifications.mark_read(&actor, id).await?,
    )
}
