//! Parent profiles, their student links and contact preferences.

use std::sync::Arc;

use domains::models::{
    ContactMethod, ContactPreferences, MaritalStatus, NotificationSettingsPatch, Page, PageRequest,
    Parent, ParentFilter, ParentLink, ParentStatus, Relationship, StudentLink, Workplace,
};
use domains::ports::{Clock, ParentRepository, Repositories, StudentRepository, UserRepository};
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
pub struct ParentListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub occupation: Option<String>,
    pub status: Option<ParentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WorkplacePatch {
    #[validate(length(max = 100))]
    pub name: Option<String>,
    pub address: Option<String>,
    #[validate(custom(function = "crate::validation::phone"))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParentRequest {
    #[validate(length(min = 2, max = 100))]
    pub occupation: Option<String>,
    #[validate(nested)]
    pub workplace: Option<WorkplacePatch>,
    pub marital_status: Option<MaritalStatus>,
    pub status: Option<ParentStatus>,
}

/// `student_id` is the human-readable student code (`STU…`).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkStudentRequest {
    #[validate(custom(function = "crate::validation::not_blank", message = "Student ID required"))]
    pub student_id: String,
    pub relationship: Relationship,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub emergency_contact: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactPreferencesRequest {
    pub preferred_method: Option<ContactMethod>,
    pub notification_settings: Option<NotificationSettingsPatch>,
    #[validate(length(min = 2, max = 5))]
    pub communication_language: Option<String>,
}

pub struct ParentService {
    parents: Arc<dyn ParentRepository>,
    students: Arc<dyn StudentRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl ParentService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            parents: repos.parents.clone(),
            students: repos.students.clone(),
            users: repos.users.clone(),
            clock,
        }
    }

    pub async fn list(&self, query: ParentListQuery) -> Result<Page<WithUser<Parent>>> {
        let filter = ParentFilter {
            occupation: query.occupation,
            status: query.status,
        };
        let page = self
            .parents
            .list(&filter, PageRequest::new(query.page, query.limit))
            .await?;
        attach_users_page(self.users.as_ref(), page, |p| p.user_id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<WithUser<Parent>> {
        let parent = self.load(id).await?;
        let user_id = parent.user_id;
        attach_user(self.users.as_ref(), parent, user_id).await
    }

    pub async fn get_by_user(&self, user_id: Uuid) -> Result<WithUser<Parent>> {
        let parent = self
            .parents
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Parent", user_id))?;
        attach_user(self.users.as_ref(), parent, user_id).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateParentRequest,
    ) -> Result<WithUser<Parent>> {
        validate_input(&req)?;
        let mut parent = self.load_owned(actor, id).await?;

        if let Some(occupation) = req.occupation {
            parent.occupation = occupation.trim().to_string();
        }
        if let Some(patch) = req.workplace {
            parent.workplace.merge(Workplace {
                name: patch.name,
                address: patch.address,
                phone: patch.phone,
                position: patch.position,
            });
        }
        if let Some(marital) = req.marital_status {
            parent.marital_status = marital;
        }
        if let Some(status) = req.status {
            parent.status = status;
        }
        parent.updated_at = self.clock.now();
        self.parents.update(&parent).await?;

        let user_id = parent.user_id;
        attach_user(self.users.as_ref(), parent, user_id).await
    }

    /// Links a student by code and writes the inverse link on the student.
    pub async fn link_student(
        &self,
        actor: &Actor,
        id: Uuid,
        req: LinkStudentRequest,
    ) -> Result<WithUser<Parent>> {
        validate_input(&req)?;
        let mut parent = self.load_owned(actor, id).await?;
        let code = req.student_id.trim().to_uppercase();
        let mut student = self
            .students
            .find_by_code(&code)
            .await?
            .ok_or_else(|| AppError::not_found("Student", &code))?;

        let now = self.clock.now();
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

        if !student.has_parent(parent.id) {
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
        }
        info!(parent_id = %parent.id, student_id = %student.id, "student linked");

        let user_id = parent.user_id;
        attach_user(self.users.as_ref(), parent, user_id).await
    }

    pub async fn update_contact_preferences(
        &self,
        actor: &Actor,
        id: Uuid,
        req: ContactPreferencesRequest,
    ) -> Result<ContactPreferences> {
        validate_input(&req)?;
        let mut parent = self.load_owned(actor, id).await?;
        let prefs = &mut parent.contact_preferences;
        if let Some(method) = req.preferred_method {
            prefs.preferred_method = method;
        }
        if let Some(patch) = req.notification_settings {
            prefs.notification_settings.apply(patch);
        }
        if let Some(language) = req.communication_language {
            prefs.communication_language = language;
        }
        parent.updated_at = self.clock.now();
        self.parents.update(&parent).await?;
        Ok(parent.contact_preferences)
    }

    pub async fn for_student(&self, student_id: Uuid) -> Result<Vec<WithUser<Parent>>> {
        let parents = self.parents.find_by_student(student_id).await?;
        attach_users(self.users.as_ref(), parents, |p| p.user_id).await
    }

    pub async fn emergency_contacts(&self, student_id: Uuid) -> Result<Vec<WithUser<Parent>>> {
        let parents: Vec<Parent> = self
            .parents
            .find_by_student(student_id)
            .await?
            .into_iter()
            .filter(|p| p.is_emergency_contact_for(student_id))
            .collect();
        attach_users(self.users.as_ref(), parents, |p| p.user_id).await
    }

    async fn load(&self, id: Uuid) -> Result<Parent> {
        self.parents
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Parent", id))
    }

    async fn load_owned(&self, actor: &Actor, id: Uuid) -> Result<Parent> {
        let parent = self.load(id).await?;
        if parent.user_id != actor.user_id {
            return Err(AppError::Forbidden("Access denied".into()));
        }
        Ok(parent)
    }
}
