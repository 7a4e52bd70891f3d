//! Student profile: one per student user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{EmergencyContact, Relationship};
use crate::error::{AppError, Result};

pub const GRADE_LEVELS: [&str; 12] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"];

pub fn is_grade_level(grade: &str) -> bool {
    GRADE_LEVELS.contains(&grade)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Graduated,
    Transferred,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentLink {
    pub parent_id: Uuid,
    pub relationship: Relationship,
    pub is_primary: bool,
    pub emergency_contact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalInfo {
    pub blood_group: Option<BloodGroup>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    pub emergency_instructions: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Bus,
    PrivateVehicle,
    Walking,
    Bicycle,
    PublicTransport,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transportation {
    pub mode: Option<TransportMode>,
    pub bus_route: Option<String>,
    pub pickup_location: Option<String>,
    pub dropoff_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Human-readable code, e.g. `STU20240001`.
    pub student_code: String,
    pub grade: String,
    pub class: Option<String>,
    pub section: Option<String>,
    pub enrollment_date: DateTime<Utc>,
    pub academic_year: String,
    pub status: StudentStatus,
    #[serde(default)]
    pub parents: Vec<ParentLink>,
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub medical_info: MedicalInfo,
    pub transportation: Option<Transportation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub user_id: Uuid,
    pub student_code: String,
    pub grade: String,
    pub class: Option<String>,
    pub section: Option<String>,
    pub academic_year: String,
}

impl Student {
    pub fn new(new: NewStudent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            student_code: new.student_code.to_uppercase(),
            grade: new.grade,
            class: new.class,
            section: new.section,
            enrollment_date: now,
            academic_year: new.academic_year,
            status: StudentStatus::Active,
            parents: Vec::new(),
            emergency_contact: None,
            medical_info: MedicalInfo::default(),
            transportation: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_parent(&self, parent_id: Uuid) -> bool {
        self.parents.iter().any(|p| p.parent_id == parent_id)
    }

    /// Appends a parent link; a second link to the same parent is a conflict.
    pub fn add_parent(&mut self, link: ParentLink, now: DateTime<Utc>) -> Result<()> {
        if self.has_parent(link.parent_id) {
            return Err(AppError::Conflict(
                "Parent already associated with this student".into(),
            ));
        }
        self.parents.push(link);
        self.updated_at = now;
        Ok(())
    }

    pub fn primary_parent(&self) -> Option<Uuid> {
        self.parents.iter().find(|p| p.is_primary).map(|p| p.parent_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub grade: Option<String>,
    pub class: Option<String>,
    pub academic_year: Option<String>,
    /// Defaults to active when unset.
    pub status: Option<StudentStatus>,
}

impl StudentFilter {
    pub fn matches(&self, student: &Student) -> bool {
        student.status == self.status.unwrap_or_default()
            && self.grade.as_ref().map_or(true, |g| &student.grade == g)
            && self
                .class
                .as_ref()
                .map_or(true, |c| student.class.as_ref() == Some(c))
            && self
                .academic_year
                .as_ref()
                .map_or(true, |y| &student.academic_year == y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student::new(
            NewStudent {
                user_id: Uuid::now_v7(),
                student_code: "stu20240001".into(),
                grade: "7".into(),
                class: Some("7A".into()),
                section: Some("A".into()),
                academic_year: "2024-2025".into(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn code_is_uppercased() {
        assert_eq!(student().student_code, "STU20240001");
    }

    #[test]
    fn duplicate_parent_link_conflicts() {
        let mut s = student();
        let parent = Uuid::now_v7();
        let link = ParentLink {
            parent_id: parent,
            relationship: Relationship::Mother,
            is_primary: true,
            emergency_contact: true,
        };
        s.add_parent(link.clone(), Utc::now()).unwrap();
        assert!(matches!(s.add_parent(link, Utc::now()), Err(AppError::Conflict(_))));
        assert_eq!(s.primary_parent(), Some(parent));
    }

    #[test]
    fn filter_defaults_to_active() {
        let mut s = student();
        let filter = StudentFilter {
            grade: Some("7".into()),
            ..Default::default()
        };
        assert!(filter.matches(&s));
        s.status = StudentStatus::Graduated;
        assert!(!filter.matches(&s));
    }

    #[test]
    fn blood_group_uses_clinical_notation() {
        let json = serde_json::to_string(&BloodGroup::AbNegative).unwrap();
        assert_eq!(json, "\"AB-\"");
        assert!(is_grade_level("12"));
        assert!(!is_grade_level("13"));
    }
}
