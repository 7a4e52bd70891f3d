//! Who is calling, and the role checks shared by every service.

use domains::models::{Parent, Role, SessionClaims, Student, Teacher};
use domains::ports::{ParentRepository, StudentRepository, TeacherRepository};
use domains::{AppError, Result};
use uuid::Uuid;

/// The authenticated caller, resolved from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<SessionClaims> for Actor {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl Actor {
    pub fn require_role(&self, role: Role) -> Result<()> {
        self.require_any(&[role])
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Unauthorized access".into()))
        }
    }

    /// The caller must be `user_id` themselves.
    pub fn require_self(&self, user_id: Uuid) -> Result<()> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".into()))
        }
    }
}

/// The caller's own student profile.
pub async fn own_student(repo: &dyn StudentRepository, actor: &Actor) -> Result<Student> {
    repo.find_by_user(actor.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student profile", actor.user_id))
}

pub async fn own_teacher(repo: &dyn TeacherRepository, actor: &Actor) -> Result<Teacher> {
    repo.find_by_user(actor.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Teacher profile", actor.user_id))
}

pub async fn own_parent(repo: &dyn ParentRepository, actor: &Actor) -> Result<Parent> {
    repo.find_by_user(actor.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Parent profile", actor.user_id))
}
