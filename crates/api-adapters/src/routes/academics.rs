//! Teacher-facing academic records: subjects, attendance sheets, assignments
//! and exam results.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use services::assignments::{ClassAssignmentsQuery, CreateAssignmentRequest};
use services::attendance::MarkAttendanceRequest;
use services::results::{ClassResultsQuery, RecordExamRequest};
use services::subjects::{CreateSubjectRequest, SubjectListQuery};

use super::{keyed, with_message, ApiResult};
use crate::extract::{ApiJson, ApiQuery, AuthUser, IdPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subjects", get(list_subjects).post(create_subject))
        .route("/attendance", post(mark_attendance))
        .route("/attendance/{id}/lock", post(lock_attendance))
        .route("/assignments", get(class_assignments).post(create_assignment))
        .route("/assignments/{id}", get(show_assignment))
        .route("/results", post(record_exam))
        .route("/results/class", get(class_ranking))
        .route("/results/{id}/publish", post(publish_result))
}

async fn create_subject(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateSubjectRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let subject = state.services.subjects.create(&actor, req).await?;
    Ok((
        StatusCode::CREATED,
        with_message("Subject created successfully", "subject", &subject)?,
    ))
}

async fn list_subjects(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SubjectListQuery>,
) -> ApiResult<Json<Value>> {
    keyed("subjects", &state.services.subjects.list(query).await?)
}

async fn mark_attendance(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<MarkAttendanceRequest>,
) -> ApiResult<Json<Value>> {
    let sheet = state.services.attendance.mark(&actor, req).await?;
    with_message("Attendance marked successfully", "attendance", &sheet)
}

async fn lock_attendance(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    let sheet = state.services.attendance.lock(&actor, id).await?;
    with_message("Attendance locked successfully", "attendance", &sheet)
}

async fn create_assignment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateAssignmentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let assignment = state.services.assignments.create(&actor, req).await?;
    Ok((
        StatusCode::CREATED,
        with_message("Assignment created successfully", "assignment", &assignment)?,
    ))
}

async fn class_assignments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(query): ApiQuery<ClassAssignmentsQuery>,
) -> ApiResult<Json<Value>> {
    keyed(
        "assignments",
        &state.services.assignments.list_for_class(&actor, query).await?,
    )
}

async fn show_assignment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    keyed("assignment", &state.services.assignments.get(&actor, id).await?)
}

async fn record_exam(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<RecordExamRequest>,
) -> ApiResult<Json<Value>> {
    let result = state.services.results.record_exam(&actor, req).await?;
    with_message("Result recorded successfully", "result", &result)
}

async fn publish_result(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    let result = state.services.results.publish(&actor, id).await?;
    with_message("Result published successfully", "result", &result)
}

async fn class_ranking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(query): ApiQuery<ClassResultsQuery>,
) -> ApiResult<Json<Value>> {
    keyed("results", &state.services.results.class_ranking(&actor, query).await?)
}
