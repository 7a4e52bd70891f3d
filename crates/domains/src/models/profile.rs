//! The role-specific half of an account.

use serde::Serialize;
use uuid::Uuid;

use super::common::Role;
use super::parent::Parent;
use super::student::Student;
use super::teacher::Teacher;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Student(Student),
    Teacher(Teacher),
    Parent(Parent),
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Student(_) => Role::Student,
            Profile::Teacher(_) => Role::Teacher,
            Profile::Parent(_) => Role::Parent,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Profile::Student(s) => s.id,
            Profile::Teacher(t) => t.id,
            Profile::Parent(p) => p.id,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            Profile::Student(s) => s.user_id,
            Profile::Teacher(t) => t.user_id,
            Profile::Parent(p) => p.user_id,
        }
    }
}
