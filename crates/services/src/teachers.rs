//! Teacher profiles, performance ratings and class assignments.

use std::sync::Arc;

use domains::models::{
    ClassAssignment, Designation, EmergencyContact, EmploymentType, Page, PageRequest,
    PerformanceRating, Role, Salary, Teacher, TeacherFilter, TeacherStatus, MAX_PAGE_SIZE,
};
use domains::ports::{Clock, Repositories, TeacherRepository, UserRepository};
use domains::{AppError, Result};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::Actor;
use crate::profiles::{attach_user, attach_users, attach_users_page, WithUser};
use crate::validation::validate_input;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub department: Option<String>,
    pub designation: Option<Designation>,
    pub subject: Option<String>,
    pub status: Option<TeacherStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeacherRequest {
    #[validate(length(min = 2, max = 100))]
    pub department: Option<String>,
    pub subjects: Option<Vec<String>>,
    #[validate(length(min = 2, max = 200))]
    pub qualification: Option<String>,
    #[validate(length(max = 100))]
    pub specialization: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub total_experience: Option<u32>,
    pub emergency_contact: Option<EmergencyContact>,
    /// Leadership only.
    pub designation: Option<Designation>,
    /// Leadership only.
    pub status: Option<TeacherStatus>,
    /// Leadership only.
    pub salary: Option<Salary>,
}

impl UpdateTeacherRequest {
    fn touches_privileged_fields(&self) -> bool {
        self.designation.is_some() || self.status.is_some() || self.salary.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRatingRequest {
    #[validate(custom(function = "crate::validation::not_blank", message = "Academic year required"))]
    pub academic_year: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(max = 1000))]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClassAssignmentInput {
    #[validate(custom(function = "crate::validation::not_blank", message = "Grade required"))]
    pub grade: String,
    #[validate(custom(function = "crate::validation::not_blank", message = "Section required"))]
    pub section: String,
    #[validate(custom(function = "crate::validation::not_blank", message = "Subject required"))]
    pub subject: String,
    #[validate(custom(function = "crate::validation::not_blank", message = "Academic year required"))]
    pub academic_year: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignClassesRequest {
    #[validate(nested)]
    pub assigned_classes: Vec<ClassAssignmentInput>,
}

pub struct TeacherService {
    teachers: Arc<dyn TeacherRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl TeacherService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            teachers: repos.teachers.clone(),
            users: repos.users.clone(),
            clock,
        }
    }

    pub async fn list(&self, query: TeacherListQuery) -> Result<Page<WithUser<Teacher>>> {
        let filter = TeacherFilter {
            department: query.department,
            designation: query.designation,
            subject: query.subject,
            status: query.status,
        };
        let page = self
            .teachers
            .list(&filter, PageRequest::new(query.page, query.limit))
            .await?;
        attach_users_page(self.users.as_ref(), page, |t| t.user_id).await
    }

    pub async fn by_department(&self, department: &str) -> Result<Vec<WithUser<Teacher>>> {
        self.all_matching(TeacherFilter {
            department: Some(department.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn by_subject(&self, subject: &str) -> Result<Vec<WithUser<Teacher>>> {
        self.all_matching(TeacherFilter {
            subject: Some(subject.to_string()),
            ..Default::default()
        })
        .await
    }

    async fn all_matching(&self, filter: TeacherFilter) -> Result<Vec<WithUser<Teacher>>> {
        let mut all = Vec::new();
        let mut request = PageRequest::new(Some(1), Some(MAX_PAGE_SIZE));
        loop {
            let page = self.teachers.list(&filter, request).await?;
            let done = page.current_page >= page.total_pages || page.items.is_empty();
            all.extend(page.items);
            if done {
                break;
            }
            request.page += 1;
        }
        attach_users(self.users.as_ref(), all, |t| t.user_id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<WithUser<Teacher>> {
        let teacher = self.load(id).await?;
        let user_id = teacher.user_id;
        attach_user(self.users.as_ref(), teacher, user_id).await
    }

    pub async fn get_by_user(&self, user_id: Uuid) -> Result<WithUser<Teacher>> {
        let teacher = self
            .teachers
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Teacher", user_id))?;
        attach_user(self.users.as_ref(), teacher, user_id).await
    }

    /// Owners edit their own profile; designation, status and salary need leadership.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateTeacherRequest,
    ) -> Result<WithUser<Teacher>> {
        validate_input(&req)?;
        let mut teacher = self.load(id).await?;
        let leader = self.is_leader(actor).await?;
        if !(leader || teacher.user_id == actor.user_id) {
            return Err(AppError::Forbidden("Access denied".into()));
        }
        if req.touches_privileged_fields() && !leader {
            return Err(AppError::Forbidden(
                "Only school leadership can change designation, status or salary".into(),
            ));
        }

        if let Some(department) = req.department {
            teacher.department = department.trim().to_string();
        }
        if let Some(subjects) = req.subjects {
            teacher.subjects = subjects;
        }
        if let Some(qualification) = req.qualification {
            teacher.qualification = qualification.trim().to_string();
        }
        if req.specialization.is_some() {
            teacher.specialization = req.specialization;
        }
        if let Some(kind) = req.employment_type {
            teacher.employment_type = kind;
        }
        if let Some(years) = req.total_experience {
            teacher.total_experience = years;
        }
        if req.emergency_contact.is_some() {
            teacher.emergency_contact = req.emergency_contact;
        }
        if let Some(designation) = req.designation {
            teacher.designation = designation;
        }
        if let Some(status) = req.status {
            teacher.status = status;
        }
        if req.salary.is_some() {
            teacher.salary = req.salary;
        }
        teacher.prepare_for_save(self.clock.now());
        self.teachers.update(&teacher).await?;

        let user_id = teacher.user_id;
        attach_user(self.users.as_ref(), teacher, user_id).await
    }

    pub async fn add_performance_rating(
        &self,
        actor: &Actor,
        id: Uuid,
        req: PerformanceRatingRequest,
    ) -> Result<PerformanceRating> {
        validate_input(&req)?;
        if !self.is_leader(actor).await? {
            return Err(AppError::Forbidden(
                "Only school leadership can rate teachers".into(),
            ));
        }
        let mut teacher = self.load(id).await?;
        let now = self.clock.now();
        let rating = PerformanceRating {
            academic_year: req.academic_year.trim().to_string(),
            rating: req.rating,
            feedback: req.feedback,
            evaluated_by: actor.user_id,
            evaluated_at: now,
        };
        teacher.performance_ratings.push(rating.clone());
        teacher.prepare_for_save(now);
        self.teachers.update(&teacher).await?;
        info!(teacher_id = %id, rating = rating.rating, "performance rating recorded");
        Ok(rating)
    }

    /// Replaces the teacher's class list.
    pub async fn assign_classes(
        &self,
        actor: &Actor,
        id: Uuid,
        req: AssignClassesRequest,
    ) -> Result<Vec<ClassAssignment>> {
        validate_input(&req)?;
        let mut teacher = self.load(id).await?;
        if teacher.user_id != actor.user_id && !self.is_leader(actor).await? {
            return Err(AppError::Forbidden("Access denied".into()));
        }
        teacher.assigned_classes = req
            .assigned_classes
            .into_iter()
            .map(|c| ClassAssignment {
                grade: c.grade.trim().to_string(),
                section: c.section.trim().to_string(),
                subject: c.subject.trim().to_string(),
                academic_year: c.academic_year.trim().to_string(),
            })
            .collect();
        teacher.prepare_for_save(self.clock.now());
        self.teachers.update(&teacher).await?;
        Ok(teacher.assigned_classes)
    }

    async fn is_leader(&self, actor: &Actor) -> Result<bool> {
        if actor.role != Role::Teacher {
            return Ok(false);
        }
        Ok(self
            .teachers
            .find_by_user(actor.user_id)
            .await?
            .is_some_and(|t| t.designation.is_leadership()))
    }

    async fn load(&self, id: Uuid) -> Result<Teacher> {
        self.teachers
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Teacher", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_repositories, MockSet};
    use chrono::Utc;
    use domains::models::NewTeacher;
    use domains::ports::SystemClock;

    fn teacher(user_id: Uuid, designation: Designation) -> Teacher {
        let mut t = Teacher::new(
            NewTeacher {
                user_id,
                teacher_code: "TCH20240001".into(),
                department: "Science".into(),
                qualification: "MSc".into(),
                subjects: vec!["Physics".into()],
            },
            Utc::now(),
        );
        t.designation = designation;
        t
    }

    fn actor(user_id: Uuid) -> Actor {
        Actor {
            user_id,
            email: "teacher@example.com".into(),
            role: Role::Teacher,
        }
    }

    fn rating() -> PerformanceRatingRequest {
        PerformanceRatingRequest {
            academic_year: "2024".into(),
            rating: 4,
            feedback: Some("Consistent".into()),
        }
    }

    #[tokio::test]
    async fn regular_teacher_cannot_rate() {
        let me = Uuid::now_v7();
        let mut mocks = MockSet::default();
        mocks
            .teachers
            .expect_find_by_user()
            .returning(move |_| Ok(Some(teacher(me, Designation::SeniorTeacher))));
        mocks.teachers.expect_update().never();
        let svc = TeacherService::new(&mock_repositories(mocks), Arc::new(SystemClock));

        let err = svc
            .add_performance_rating(&actor(me), Uuid::now_v7(), rating())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn principal_rating_is_appended() {
        let principal = Uuid::now_v7();
        let rated = teacher(Uuid::now_v7(), Designation::Teacher);
        let rated_id = rated.id;
        let mut mocks = MockSet::default();
        mocks
            .teachers
            .expect_find_by_user()
            .returning(move |_| Ok(Some(teacher(principal, Designation::Principal))));
        mocks
            .teachers
            .expect_find_by_id()
            .returning(move |_| Ok(Some(rated.clone())));
        mocks
            .teachers
            .expect_update()
            .withf(|t| t.performance_ratings.len() == 1)
            .times(1)
            .returning(|_| Ok(()));
        let svc = TeacherService::new(&mock_repositories(mocks), Arc::new(SystemClock));

        let saved = svc
            .add_performance_rating(&actor(principal), rated_id, rating())
            .await
            .unwrap();
        assert_eq!(saved.evaluated_by, principal);
    }

    #[tokio::test]
    async fn owner_cannot_promote_themself() {
        let me = Uuid::now_v7();
        let own = teacher(me, Designation::Teacher);
        let own_id = own.id;
        let mut mocks = MockSet::default();
        let lookup = own.clone();
        mocks
            .teachers
            .expect_find_by_id()
            .returning(move |_| Ok(Some(own.clone())));
        mocks
            .teachers
            .expect_find_by_user()
            .returning(move |_| Ok(Some(lookup.clone())));
        mocks.teachers.expect_update().never();
        let svc = TeacherService::new(&mock_repositories(mocks), Arc::new(SystemClock));

        let req = UpdateTeacherRequest {
            designation: Some(Designation::Principal),
            ..Default::default()
        };
        let err = svc.update(&actor(me), own_id, req).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
