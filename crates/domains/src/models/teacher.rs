//! Teacher profile: one per teacher user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::EmergencyContact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Substitute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Designation {
    #[default]
    Teacher,
    SeniorTeacher,
    HeadTeacher,
    VicePrincipal,
    Principal,
    Coordinator,
}

impl Designation {
    /// Staff allowed to rate other teachers and reassign their classes.
    pub fn is_leadership(&self) -> bool {
        matches!(
            self,
            Designation::HeadTeacher | Designation::VicePrincipal | Designation::Principal
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeacherStatus {
    #[default]
    Active,
    Inactive,
    OnLeave,
    Terminated,
    Retired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAssignment {
    pub grade: String,
    pub section: String,
    pub subject: String,
    pub academic_year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRating {
    pub academic_year: String,
    pub rating: u8,
    pub feedback: Option<String>,
    pub evaluated_by: Uuid,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub basic: Option<f64>,
    pub allowances: Option<f64>,
    pub total: Option<f64>,
}

impl Salary {
    /// `total = basic + allowances` when both parts are present.
    pub fn recompute(&mut self) {
        if let (Some(basic), Some(allowances)) = (self.basic, self.allowances) {
            self.total = Some(basic + allowances);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Human-readable code, e.g. `TCH20240001`.
    pub teacher_code: String,
    pub employee_number: Option<String>,
    pub department: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    pub qualification: String,
    pub specialization: Option<String>,
    pub joining_date: DateTime<Utc>,
    pub employment_type: EmploymentType,
    pub designation: Designation,
    pub status: TeacherStatus,
    pub total_experience: u32,
    #[serde(default)]
    pub assigned_classes: Vec<ClassAssignment>,
    pub emergency_contact: Option<EmergencyContact>,
    pub reporting_manager: Option<Uuid>,
    pub salary: Option<Salary>,
    #[serde(default)]
    pub performance_ratings: Vec<PerformanceRating>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub user_id: Uuid,
    pub teacher_code: String,
    pub department: String,
    pub qualification: String,
    pub subjects: Vec<String>,
}

impl Teacher {
    pub fn new(new: NewTeacher, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            teacher_code: new.teacher_code.to_uppercase(),
            employee_number: None,
            department: new.department,
            subjects: new.subjects,
            qualification: new.qualification,
            specialization: None,
            joining_date: now,
            employment_type: EmploymentType::default(),
            designation: Designation::default(),
            status: TeacherStatus::default(),
            total_experience: 0,
            assigned_classes: Vec::new(),
            emergency_contact: None,
            reporting_manager: None,
            salary: None,
            performance_ratings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Derived fields, applied before every save.
    pub fn prepare_for_save(&mut self, now: DateTime<Utc>) {
        if let Some(salary) = self.salary.as_mut() {
            salary.recompute();
        }
        self.updated_at = now;
    }

    pub fn classes_for_year(&self, academic_year: &str) -> Vec<&ClassAssignment> {
        self.assigned_classes
            .iter()
            .filter(|c| c.academic_year == academic_year)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TeacherFilter {
    pub department: Option<String>,
    pub designation: Option<Designation>,
    /// Matches teachers listing this subject.
    pub subject: Option<String>,
    /// Defaults to active when unset.
    pub status: Option<TeacherStatus>,
}

impl TeacherFilter {
    pub fn matches(&self, teacher: &Teacher) -> bool {
        teacher.status == self.status.unwrap_or_default()
            && self
                .department
                .as_ref()
                .map_or(true, |d| &teacher.department == d)
            && self.designation.map_or(true, |d| teacher.designation == d)
            && self
                .subject
                .as_ref()
                .map_or(true, |s| teacher.subjects.contains(s))
    }
}
