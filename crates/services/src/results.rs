//! Exam results: teacher entry, publishing and class rankings.

use std::sync::Arc;

use domains::models::{rank_by_total, ExamResult, ExamType, ResultKey, ResultRecord, Role, Term};
use domains::ports::{Clock, Repositories, ResultRepository, StudentRepository, SubjectRepository};
use domains::{AppError, Result};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::Actor;
use crate::validation::validate_input;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordExamRequest {
    #[serde(alias = "student")]
    pub student_id: Uuid,
    #[validate(length(min = 1, max = 50, message = "Class is required"))]
    pub class: String,
    #[validate(length(min = 4, max = 10))]
    pub academic_year: String,
    pub term: Term,
    pub exam_type: ExamType,
    #[serde(alias = "subject")]
    pub subject_id: Uuid,
    #[validate(range(min = 0.0, message = "Marks obtained cannot be negative"))]
    pub marks_obtained: f64,
    #[validate(range(exclusive_min = 0.0, message = "Maximum marks must be positive"))]
    pub max_marks: f64,
    #[validate(length(max = 5))]
    pub grade: Option<String>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassResultsQuery {
    pub class: String,
    pub academic_year: String,
    pub term: Term,
}

pub struct ResultService {
    results: Arc<dyn ResultRepository>,
    students: Arc<dyn StudentRepository>,
    subjects: Arc<dyn SubjectRepository>,
    clock: Arc<dyn Clock>,
}

impl ResultService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            results: repos.results.clone(),
            students: repos.students.clone(),
            subjects: repos.subjects.clone(),
            clock,
        }
    }

    /// Find-or-create the (student, year, term) record, then upsert the
    /// entry keyed by (exam type, subject). Totals are recomputed on every call.
    pub async fn record_exam(&self, actor: &Actor, req: RecordExamRequest) -> Result<ResultRecord> {
        actor.require_role(Role::Teacher)?;
        validate_input(&req)?;
        if req.marks_obtained > req.max_marks {
            return Err(AppError::invalid_field(
                "marksObtained",
                "Marks obtained cannot exceed maximum marks",
            ));
        }
        if self.students.find_by_id(req.student_id).await?.is_none() {
            return Err(AppError::not_found("Student", req.student_id));
        }
        if self.subjects.find_by_id(req.subject_id).await?.is_none() {
            return Err(AppError::not_found("Subject", req.subject_id));
        }

        let now = self.clock.now();
        let key = ResultKey {
            student_id: req.student_id,
            academic_year: req.academic_year.trim().to_string(),
            term: req.term,
        };
        let mut record = match self.results.find_by_key(&key).await? {
            Some(existing) => existing,
            None => ResultRecord::new(key, req.class.trim().to_string(), now),
        };
        record.upsert_exam(
            ExamResult {
                exam_type: req.exam_type,
                subject_id: req.subject_id,
                marks_obtained: req.marks_obtained,
                max_marks: req.max_marks,
                grade: req.grade,
                remarks: req.remarks,
                published: false,
                published_at: None,
                published_by: None,
                subject: None,
            },
            now,
        );
        self.results.save(&record).await?;
        info!(
            result_id = %record.id,
            student_id = %record.student_id,
            percentage = record.percentage,
            "exam result recorded"
        );
        Ok(record)
    }

    pub async fn publish(&self, actor: &Actor, id: Uuid) -> Result<ResultRecord> {
        actor.require_role(Role::Teacher)?;
        let mut record = self
            .results
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Result", id))?;
        record.publish(actor.user_id, self.clock.now());
        self.results.save(&record).await?;
        info!(result_id = %record.id, "result published");
        Ok(record)
    }

    /// Published results for the class, ranked by total marks.
    pub async fn class_ranking(
        &self,
        actor: &Actor,
        query: ClassResultsQuery,
    ) -> Result<Vec<ResultRecord>> {
        actor.require_role(Role::Teacher)?;
        let published = self
            .results
            .list_published_for_class(query.class.trim(), query.academic_year.trim(), query.term)
            .await?;
        Ok(rank_by_total(published))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_repositories, MockSet};
    use chrono::Utc;
    use domains::models::{LetterGrade, NewStudent, NewSubject, Student, Subject};
    use domains::ports::SystemClock;

    fn teacher_actor() -> Actor {
        Actor {
            user_id: Uuid::now_v7(),
            email: "t@example.com".into(),
            role: Role::Teacher,
        }
    }

    fn request(obtained: f64, max: f64) -> RecordExamRequest {
        RecordExamRequest {
            student_id: Uuid::now_v7(),
            class: "7A".into(),
            academic_year: "2024".into(),
            term: Term::First,
            exam_type: ExamType::Midterm,
            subject_id: Uuid::now_v7(),
            marks_obtained: obtained,
            max_marks: max,
            grade: None,
            remarks: None,
        }
    }

    fn stock_lookups(mocks: &mut MockSet) {
        mocks.students.expect_find_by_id().returning(|_| {
            Ok(Some(Student::new(
                NewStudent {
                    user_id: Uuid::now_v7(),
                    student_code: "STU20240004".into(),
                    grade: "7".into(),
                    class: Some("7A".into()),
                    section: None,
                    academic_year: "2024".into(),
                },
                Utc::now(),
            )))
        });
        mocks.subjects.expect_find_by_id().returning(|_| {
            Ok(Some(Subject::new(
                NewSubject {
                    name: "History".into(),
                    code: "HIS".into(),
                    description: None,
                    credits: 2,
                    teacher_id: Uuid::now_v7(),
                    grade: "7".into(),
                    academic_year: "2024".into(),
                    schedule: vec![],
                },
                Utc::now(),
            )))
        });
    }

    #[tokio::test]
    async fn marks_above_maximum_are_rejected() {
        let svc = ResultService::new(&mock_repositories(MockSet::default()), Arc::new(SystemClock));
        let err = svc
            .record_exam(&teacher_actor(), request(101.0, 100.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidFields(f) if f[0].field == "marksObtained"));
    }

    #[tokio::test]
    async fn first_entry_creates_the_record_with_totals() {
        let mut mocks = MockSet::default();
        stock_lookups(&mut mocks);
        mocks.results.expect_find_by_key().returning(|_| Ok(None));
        mocks
            .results
            .expect_save()
            .withf(|r| r.total_marks == 85.0 && r.exam_results.len() == 1)
            .times(1)
            .returning(|_| Ok(()));
        let svc = ResultService::new(&mock_repositories(mocks), Arc::new(SystemClock));

        let record = svc
            .record_exam(&teacher_actor(), request(85.0, 100.0))
            .await
            .unwrap();
        assert_eq!(record.grade, LetterGrade::A);
        assert!(!record.is_published);
    }

    #[tokio::test]
    async fn publishing_stamps_the_publisher() {
        let actor = teacher_actor();
        let mut record = ResultRecord::new(
            ResultKey {
                student_id: Uuid::now_v7(),
                academic_year: "2024".into(),
                term: Term::Second,
            },
            "7A".into(),
            Utc::now(),
        );
        record.upsert_exam(
            ExamResult {
                exam_type: ExamType::Final,
                subject_id: Uuid::now_v7(),
                marks_obtained: 40.0,
                max_marks: 50.0,
                grade: None,
                remarks: None,
                published: false,
                published_at: None,
                published_by: None,
                subject: None,
            },
            Utc::now(),
        );
        let mut mocks = MockSet::default();
        mocks
            .results
            .expect_find_by_id()
            .returning(move |_| Ok(Some(record.clone())));
        mocks.results.expect_save().returning(|_| Ok(()));
        let svc = ResultService::new(&mock_repositories(mocks), Arc::new(SystemClock));

        let published = svc.publish(&actor, Uuid::now_v7()).await.unwrap();
        assert!(published.is_published);
        assert_eq!(published.published_by, Some(actor.user_id));
        assert!(published.exam_results.iter().all(|e| e.published));
    }
}
