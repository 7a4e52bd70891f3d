//! Subjects and their weekly timetable slots.

use std::sync::Arc;

use chrono::Datelike;
use domains::models::{NewSubject, Role, ScheduleSlot, SchoolDay, Subject};
use domains::ports::{Clock, Repositories, SubjectRepository, TeacherRepository};
use domains::{AppError, FieldError, Result};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::access::{own_teacher, Actor};
use crate::validation::validate_input;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlotInput {
    pub day: SchoolDay,
    #[validate(custom(function = "crate::validation::time_of_day"))]
    pub start_time: String,
    #[validate(custom(function = "crate::validation::time_of_day"))]
    pub end_time: String,
    #[validate(length(max = 50))]
    pub room: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubjectRequest {
    #[validate(length(min = 2, max = 100, message = "Subject name must be 2-100 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 20, message = "Subject code must be 2-20 characters"))]
    pub code: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 10, message = "Credits must be between 1 and 10"))]
    pub credits: u8,
    #[validate(custom(function = "crate::validation::grade_level"))]
    pub grade: String,
    #[validate(length(min = 4, max = 10))]
    pub academic_year: String,
    #[serde(default)]
    #[validate(nested)]
    pub schedule: Vec<ScheduleSlotInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectListQuery {
    pub grade: Option<String>,
    pub academic_year: Option<String>,
}

pub struct SubjectService {
    subjects: Arc<dyn SubjectRepository>,
    teachers: Arc<dyn TeacherRepository>,
    clock: Arc<dyn Clock>,
}

impl SubjectService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            subjects: repos.subjects.clone(),
            teachers: repos.teachers.clone(),
            clock,
        }
    }

    /// The calling teacher becomes the subject's teacher.
    pub async fn create(&self, actor: &Actor, req: CreateSubjectRequest) -> Result<Subject> {
        actor.require_role(Role::Teacher)?;
        validate_input(&req)?;
        check_slot_order(&req.schedule)?;
        let teacher = own_teacher(self.teachers.as_ref(), actor).await?;

        let subject = Subject::new(
            NewSubject {
                name: req.name,
                code: req.code,
                description: req.description.map(|d| d.trim().to_string()),
                credits: req.credits,
                teacher_id: teacher.id,
                grade: req.grade,
                academic_year: req.academic_year.trim().to_string(),
                schedule: req
                    .schedule
                    .into_iter()
                    .map(|s| ScheduleSlot {
                        day: s.day,
                        start_time: s.start_time,
                        end_time: s.end_time,
                        room: s.room,
                    })
                    .collect(),
            },
            self.clock.now(),
        );
        self.subjects.insert(&subject).await?;
        info!(subject_id = %subject.id, code = %subject.code, "subject created");
        Ok(subject)
    }

    /// Active subjects for a grade; the academic year defaults to the current calendar year.
    pub async fn list(&self, query: SubjectListQuery) -> Result<Vec<Subject>> {
        let grade = query
            .grade
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| AppError::invalid_field("grade", "Grade is required"))?;
        let year = query
            .academic_year
            .unwrap_or_else(|| self.clock.now().year().to_string());
        self.subjects.list_by_grade(grade.trim(), year.trim()).await
    }
}

fn check_slot_order(slots: &[ScheduleSlotInput]) -> Result<()> {
    let errors: Vec<FieldError> = slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.end_time <= s.start_time)
        .map(|(i, _)| {
            FieldError::new(
                format!("schedule[{i}].endTime"),
                "End time must be after start time",
            )
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidFields(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_repositories, MockSet};
    use chrono::Utc;
    use domains::models::{NewTeacher, Teacher};
    use domains::ports::SystemClock;
    use uuid::Uuid;

    fn request(slots: Vec<(&str, &str)>) -> CreateSubjectRequest {
        CreateSubjectRequest {
            name: "Physics".into(),
            code: "phy-7".into(),
            description: None,
            credits: 4,
            grade: "7".into(),
            academic_year: "2024-2025".into(),
            schedule: slots
                .into_iter()
                .map(|(start, end)| ScheduleSlotInput {
                    day: SchoolDay::Tuesday,
                    start_time: start.into(),
                    end_time: end.into(),
                    room: Some("Lab 2".into()),
                })
                .collect(),
        }
    }

    fn teacher_actor() -> Actor {
        Actor {
            user_id: Uuid::now_v7(),
            email: "t@example.com".into(),
            role: Role::Teacher,
        }
    }

    #[tokio::test]
    async fn students_cannot_create_subjects() {
        let svc = SubjectService::new(&mock_repositories(MockSet::default()), Arc::new(SystemClock));
        let actor = Actor {
            role: Role::Student,
            ..teacher_actor()
        };
        let err = svc.create(&actor, request(vec![])).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn end_before_start_is_a_field_error() {
        let svc = SubjectService::new(&mock_repositories(MockSet::default()), Arc::new(SystemClock));
        let err = svc
            .create(&teacher_actor(), request(vec![("09:00", "10:00"), ("11:00", "10:30")]))
            .await
            .unwrap_err();
        match err {
            AppError::InvalidFields(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "schedule[1].endTime");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn created_subject_belongs_to_the_calling_teacher() {
        let actor = teacher_actor();
        let teacher = Teacher::new(
            NewTeacher {
                user_id: actor.user_id,
                teacher_code: "TCH20240001".into(),
                department: "Science".into(),
                qualification: "MSc".into(),
                subjects: vec!["Physics".into()],
            },
            Utc::now(),
        );
        let tid = teacher.id;
        let mut mocks = MockSet::default();
        mocks
            .teachers
            .expect_find_by_user()
            .returning(move |_| Ok(Some(teacher.clone())));
        mocks
            .subjects
            .expect_insert()
            .withf(move |s| s.teacher_id == tid && s.code == "PHY-7")
            .times(1)
            .returning(|_| Ok(()));
        let svc = SubjectService::new(&mock_repositories(mocks), Arc::new(SystemClock));

        let subject = svc
            .create(&actor, request(vec![("08:00", "08:45")]))
            .await
            .unwrap();
        assert_eq!(subject.schedule.len(), 1);
    }
}
