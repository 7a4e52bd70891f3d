//! Teacher-side assignments: creating them and reviewing a class's list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::models::{Assignment, AssignmentStatus, Attachment, NewAssignment, Role};
use domains::ports::{AssignmentRepository, Clock, Repositories, SubjectRepository, TeacherRepository};
use domains::{AppError, Result};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::{own_teacher, Actor};
use crate::validation::validate_input;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(url(message = "Attachment URL must be valid"))]
    pub url: String,
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be 3-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Description is required"))]
    pub description: String,
    #[serde(alias = "subject")]
    pub subject_id: Uuid,
    #[validate(length(min = 1, max = 50, message = "Class is required"))]
    pub class: String,
    pub due_date: DateTime<Utc>,
    #[validate(range(min = 1, message = "Total marks must be at least 1"))]
    pub total_marks: u32,
    #[serde(default)]
    pub status: AssignmentStatus,
    #[serde(default)]
    #[validate(nested)]
    pub attachments: Vec<AttachmentInput>,
    #[validate(length(min = 4, max = 10))]
    pub academic_year: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAssignmentsQuery {
    pub class: String,
    pub status: Option<AssignmentStatus>,
}

pub struct AssignmentService {
    assignments: Arc<dyn AssignmentRepository>,
    subjects: Arc<dyn SubjectRepository>,
    teachers: Arc<dyn TeacherRepository>,
    clock: Arc<dyn Clock>,
}

impl AssignmentService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            assignments: repos.assignments.clone(),
            subjects: repos.subjects.clone(),
            teachers: repos.teachers.clone(),
            clock,
        }
    }

    pub async fn create(&self, actor: &Actor, req: CreateAssignmentRequest) -> Result<Assignment> {
        actor.require_role(Role::Teacher)?;
        validate_input(&req)?;
        let teacher = own_teacher(self.teachers.as_ref(), actor).await?;
        if self.subjects.find_by_id(req.subject_id).await?.is_none() {
            return Err(AppError::not_found("Subject", req.subject_id));
        }

        let assignment = Assignment::new(
            NewAssignment {
                title: req.title,
                description: req.description,
                subject_id: req.subject_id,
                teacher_id: teacher.id,
                class: req.class.trim().to_string(),
                due_date: req.due_date,
                total_marks: req.total_marks,
                status: req.status,
                attachments: req
                    .attachments
                    .into_iter()
                    .map(|a| Attachment {
                        name: a.name,
                        url: a.url,
                        size: a.size,
                        content_type: a.content_type,
                    })
                    .collect(),
                academic_year: req.academic_year.trim().to_string(),
            },
            self.clock.now(),
        );
        self.assignments.insert(&assignment).await?;
        info!(assignment_id = %assignment.id, class = %assignment.class, "assignment created");
        Ok(assignment)
    }

    /// Full assignments, submissions included, for one class.
    pub async fn list_for_class(
        &self,
        actor: &Actor,
        query: ClassAssignmentsQuery,
    ) -> Result<Vec<Assignment>> {
        actor.require_role(Role::Teacher)?;
        self.assignments
            .list_by_class(query.class.trim(), query.status)
            .await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Assignment> {
        actor.require_role(Role::Teacher)?;
        self.assignments
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Assignment", id))
    }
}
