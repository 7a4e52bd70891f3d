//! Student profiles: directory, updates, parent links and medical info.

use std::sync::Arc;

use domains::models::{
    BloodGroup, EmergencyContact, MedicalInfo, Page, PageRequest, ParentLink, Relationship, Role,
    Student, StudentFilter, StudentLink, StudentStatus, Transportation,
};
use domains::ports::{Clock, ParentRepository, Repositories, StudentRepository, UserRepository};
use domains::{AppError, Result};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::{own_parent, Actor};
use crate::profiles::{attach_user, attach_users_page, WithUser};
use crate::validation::validate_input;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub grade: Option<String>,
    pub class: Option<String>,
    pub academic_year: Option<String>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    #[validate(custom(function = "crate::validation::grade_level"))]
    pub grade: Option<String>,
    #[validate(length(max = 50))]
    pub class: Option<String>,
    #[validate(length(max = 50))]
    pub section: Option<String>,
    #[validate(length(max = 10))]
    pub academic_year: Option<String>,
    pub status: Option<StudentStatus>,
    pub emergency_contact: Option<EmergencyContact>,
    pub transportation: Option<Transportation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParentRequest {
    pub parent_id: Uuid,
    pub relationship: Relationship,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub emergency_contact: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MedicalInfoRequest {
    pub blood_group: Option<BloodGroup>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    #[validate(length(max = 500, message = "Emergency instructions are limited to 500 characters"))]
    pub emergency_instructions: Option<String>,
}

pub struct StudentService {
    students: Arc<dyn StudentRepository>,
    parents: Arc<dyn ParentRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl StudentService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            students: repos.students.clone(),
            parents: repos.parents.clone(),
            users: repos.users.clone(),
            clock,
        }
    }

    pub async fn list(&self, query: StudentListQuery) -> Result<Page<WithUser<Student>>> {
        let filter = StudentFilter {
            grade: query.grade,
            class: query.class,
            academic_year: query.academic_year,
            status: query.status,
        };
        let page = self
            .students
            .list(&filter, PageRequest::new(query.page, query.limit))
            .await?;
        attach_users_page(self.users.as_ref(), page, |s| s.user_id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<WithUser<Student>> {
        let student = self.load(id).await?;
        let user_id = student.user_id;
        attach_user(self.users.as_ref(), student, user_id).await
    }

    pub async fn get_by_user(&self, user_id: Uuid) -> Result<WithUser<Student>> {
        let student = self
            .students
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Student", user_id))?;
        attach_user(self.users.as_ref(), student, user_id).await
    }

    /// The student themself or any teacher.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateStudentRequest,
    ) -> Result<WithUser<Student>> {
        validate_input(&req)?;
        let mut student = self.load(id).await?;
        Self::require_owner_or_teacher(actor, &student)?;

        if let Some(grade) = req.grade {
            student.grade = grade;
        }
        if let Some(class) = req.class {
            student.class = Some(class.trim().to_string());
        }
        if let Some(section) = req.section {
            student.section = Some(section.trim().to_string());
        }
        if let Some(year) = req.academic_year {
            student.academic_year = year.trim().to_string();
        }
        if let Some(status) = req.status {
            student.status = status;
        }
        if req.emergency_contact.is_some() {
            student.emergency_contact = req.emergency_contact;
        }
        if req.transportation.is_some() {
            student.transportation = req.transportation;
        }
        student.updated_at = self.clock.now();
        self.students.update(&student).await?;

        let user_id = student.user_id;
        attach_user(self.users.as_ref(), student, user_id).await
    }

    /// Links a parent profile and writes the inverse link on the parent.
    pub async fn add_parent(
        &self,
        actor: &Actor,
        id: Uuid,
        req: AddParentRequest,
    ) -> Result<WithUser<Student>> {
        let mut student = self.load(id).await?;
        Self::require_owner_or_teacher(actor, &student)?;
        let mut parent = self
            .parents
            .find_by_id(req.parent_id)
            .await?
            .ok_or_else(|| AppError::not_found("Parent", req.parent_id))?;

        let now = self.clock.now();
        student.add_parent(
            ParentLink {
                parent_id: parent.id,
                relationship: req.relationship,
                is_primary: req.is_primary,
                emergency_contact: req.emergency_contact,
            },
            now,
        )?;
        self.students.update(&student).await?;

        if !parent.has_student(student.id) {
            parent.add_student(
                StudentLink {
                    student_id: student.id,
                    relationship: req.relationship,
                    is_primary: req.is_primary,
                    emergency_contact: req.emergency_contact,
                },
                now,
            )?;
            self.parents.update(&parent).await?;
        }
        info!(student_id = %student.id, parent_id = %parent.id, "parent linked");

        let user_id = student.user_id;
        attach_user(self.users.as_ref(), student, user_id).await
    }

    /// The student, any teacher, or a parent linked to the student.
    pub async fn update_medical(
        &self,
        actor: &Actor,
        id: Uuid,
        req: MedicalInfoRequest,
    ) -> Result<MedicalInfo> {
        validate_input(&req)?;
        let mut student = self.load(id).await?;
        let allowed = match actor.role {
            Role::Parent => {
                let parent = own_parent(self.parents.as_ref(), actor).await?;
                student.has_parent(parent.id) || parent.has_student(student.id)
            }
            _ => Self::require_owner_or_teacher(actor, &student).is_ok(),
        };
        if !allowed {
            return Err(AppError::Forbidden("Access denied".into()));
        }

        student.medical_info = MedicalInfo {
            blood_group: req.blood_group,
            allergies: req.allergies,
            medications: req.medications,
            medical_conditions: req.medical_conditions,
            emergency_instructions: req.emergency_instructions.map(|s| s.trim().to_string()),
        };
        student.updated_at = self.clock.now();
        self.students.update(&student).await?;
        Ok(student.medical_info)
    }

    fn require_owner_or_teacher(actor: &Actor, student: &Student) -> Result<()> {
        if actor.role == Role::Teacher || actor.user_id == student.user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".into()))
        }
    }

    async fn load(&self, id: Uuid) -> Result<Student> {
        self.students
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Student", id))
    }
}
