//! # Routes
//!
//! [`app`] assembles the full router: public and bearer-protected route
//! groups under `/api`, `/metrics`, the JSON 404 fallback and the middleware
//! stack.

pub mod academics;
pub mod auth;
pub mod captcha;
pub mod health;
pub mod notifications;
pub mod parents;
pub mod portal;
pub mod students;
pub mod teachers;
pub mod users;

use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use domains::models::Page;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{warn, Level};

use crate::middleware::{auth_required, internal_error_detail, rate_limit, track_requests};
use crate::state::AppState;
use crate::{error::ApiError, metrics};

/// The complete application, ready for `axum::serve`.
pub fn app(state: AppState) -> Router {
    let public = Router::new()
        .merge(health::routes())
        .merge(captcha::routes())
        .merge(auth::public_routes());

    let protected = Router::new()
        .merge(auth::protected_routes())
        .nest("/users", users::routes())
        .nest("/students", portal::routes().merge(students::routes()))
        .nest("/teachers", teachers::routes())
        .nest("/parents", parents::routes())
        .merge(academics::routes())
        .nest("/notifications", notifications::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_required));

    Router::new()
        .nest("/api", public.merge(protected))
        .route("/metrics", get(metrics::export))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), internal_error_detail))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors(&state.http.frontend_url))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

fn cors(frontend_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            warn!(frontend_url, "FRONTEND_URL is not a valid origin; cross-origin requests will be refused");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([
            HeaderName::from_static(captcha::CAPTCHA_ID_HEADER),
            HeaderName::from_static("x-request-id"),
        ])
}

async fn not_found(uri: Uri) -> Response {
    let message = if uri.path().starts_with("/api/") {
        "API endpoint not found"
    } else {
        "Not found"
    };
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// `{ <key>: items, totalPages, currentPage, total }`.
pub(crate) fn listing<T: Serialize>(key: &str, page: Page<T>) -> ApiResult<Json<Value>> {
    let mut body = Map::new();
    body.insert(key.into(), to_value(&page.items)?);
    body.insert("totalPages".into(), page.total_pages.into());
    body.insert("currentPage".into(), page.current_page.into());
    body.insert("total".into(), page.total.into());
    Ok(Json(Value::Object(body)))
}

/// `{ message, <key>: value }`, the shape of every successful write.
pub(crate) fn with_message<T: Serialize>(message: &str, key: &str, value: &T) -> ApiResult<Json<Value>> {
    let mut body = Map::new();
    body.insert("message".into(), message.into());
    body.insert(key.into(), to_value(value)?);
    Ok(Json(Value::Object(body)))
}

/// `{ <key>: value }`.
pub(crate) fn keyed<T: Serialize>(key: &str, value: &T) -> ApiResult<Json<Value>> {
    let mut body = Map::new();
    body.insert(key.into(), to_value(value)?);
    Ok(Json(Value::Object(body)))
}

pub(crate) fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

fn to_value<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError(e.into()))
}
