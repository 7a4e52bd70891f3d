//! Parent profile and its links to students.
//!
//! The student side keeps the inverse link (`Student::parents`); services
//! write both so the two lists agree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::Relationship;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaritalStatus {
    Single,
    #[default]
    Married,
    Divorced,
    Widowed,
    Separated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workplace {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
}

impl Workplace {
    /// Field-wise merge: only the parts present in `patch` replace ours.
    pub fn merge(&mut self, patch: Workplace) {
        if patch.name.is_some() {
            self.name = patch.name;
        }
        if patch.address.is_some() {
            self.address = patch.address;
        }
        if patch.phone.is_some() {
            self.phone = patch.phone;
        }
        if patch.position.is_some() {
            self.position = patch.position;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentLink {
    pub student_id: Uuid,
    pub relationship: Relationship,
    pub is_primary: bool,
    pub emergency_contact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    #[default]
    Email,
    Phone,
    Sms,
    AppNotification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub academic_updates: bool,
    pub attendance_alerts: bool,
    pub grade_notifications: bool,
    pub event_reminders: bool,
    pub emergency_alerts: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            academic_updates: true,
            attendance_alerts: true,
            grade_notifications: true,
            event_reminders: true,
            emergency_alerts: true,
        }
    }
}

/// Partial update for [`NotificationSettings`]; unset switches keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettingsPatch {
    pub academic_updates: Option<bool>,
    pub attendance_alerts: Option<bool>,
    pub grade_notifications: Option<bool>,
    pub event_reminders: Option<bool>,
    pub emergency_alerts: Option<bool>,
}

impl NotificationSettings {
    pub fn apply(&mut self, patch: NotificationSettingsPatch) {
        let NotificationSettingsPatch {
            academic_updates,
            attendance_alerts,
            grade_notifications,
            event_reminders,
            emergency_alerts,
        } = patch;
        self.academic_updates = academic_updates.unwrap_or(self.academic_updates);
        self.attendance_alerts = attendance_alerts.unwrap_or(self.attendance_alerts);
        self.grade_notifications = grade_notifications.unwrap_or(self.grade_notifications);
        self.event_reminders = event_reminders.unwrap_or(self.event_reminders);
        self.emergency_alerts = emergency_alerts.unwrap_or(self.emergency_alerts);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPreferences {
    pub preferred_method: ContactMethod,
    pub notification_settings: NotificationSettings,
    pub communication_language: String,
}

impl Default for ContactPreferences {
    fn default() -> Self {
        Self {
            preferred_method: ContactMethod::default(),
            notification_settings: NotificationSettings::default(),
            communication_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parent {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Human-readable code, e.g. `PAR20240001`.
    pub parent_code: String,
    pub marital_status: MaritalStatus,
    pub occupation: String,
    #[serde(default)]
    pub workplace: Workplace,
    #[serde(default)]
    pub students: Vec<StudentLink>,
    #[serde(default)]
    pub contact_preferences: ContactPreferences,
    pub status: ParentStatus,
    pub enrollment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewParent {
    pub user_id: Uuid,
    pub parent_code: String,
    pub occupation: String,
}

impl Parent {
    pub fn new(new: NewParent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            parent_code: new.parent_code.to_uppercase(),
            marital_status: MaritalStatus::default(),
            occupation: new.occupation,
            workplace: Workplace::default(),
            students: Vec::new(),
            contact_preferences: ContactPreferences::default(),
            status: ParentStatus::default(),
            enrollment_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_student(&self, student_id: Uuid) -> bool {
        self.students.iter().any(|s| s.student_id == student_id)
    }

    pub fn add_student(&mut self, link: StudentLink, now: DateTime<Utc>) -> Result<()> {
        if self.has_student(link.student_id) {
            return Err(AppError::Conflict(
                "Student already associated with this parent".into(),
            ));
        }
        self.students.push(link);
        self.updated_at = now;
        Ok(())
    }

    pub fn primary_students(&self) -> Vec<Uuid> {
        self.students
            .iter()
            .filter(|s| s.is_primary)
            .map(|s| s.student_id)
            .collect()
    }

    /// True when this parent is flagged as an emergency contact for the student.
    pub fn is_emergency_contact_for(&self, student_id: Uuid) -> bool {
        self.students
            .iter()
            .any(|s| s.student_id == student_id && s.emergency_contact)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParentFilter {
    pub occupation: Option<String>,
    /// Defaults to active when unset.
    pub status: Option<ParentStatus>,
}

impl ParentFilter {
    pub fn matches(&self, parent: &Parent) -> bool {
        parent.status == self.status.unwrap_or_default()
            && self
                .occupation
                .as_ref()
                .map_or(true, |o| parent.occupation.eq_ignore_ascii_case(o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> Parent {
        Parent::new(
            NewParent {
                user_id: Uuid::now_v7(),
                parent_code: "PAR20240001".into(),
                occupation: "Engineer".into(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn defaults_enable_every_notification() {
        let p = parent();
        assert_eq!(p.contact_preferences.communication_language, "en");
        assert!(p.contact_preferences.notification_settings.emergency_alerts);
        assert_eq!(p.contact_preferences.preferred_method, ContactMethod::Email);
    }

    #[test]
    fn settings_patch_keeps_unset_switches() {
        let mut settings = NotificationSettings::default();
        settings.apply(NotificationSettingsPatch {
            event_reminders: Some(false),
            ..Default::default()
        });
        assert!(!settings.event_reminders);
        assert!(settings.academic_updates);
    }

    #[test]
    fn linking_twice_conflicts() {
        let mut p = parent();
        let student = Uuid::now_v7();
        let link = StudentLink {
            student_id: student,
            relationship: Relationship::Father,
            is_primary: false,
            emergency_contact: true,
        };
        p.add_student(link.clone(), Utc::now()).unwrap();
        assert!(p.is_emergency_contact_for(student));
        assert!(p.primary_students().is_empty());
        assert!(matches!(p.add_student(link, Utc::now()), Err(AppError::Conflict(_))));
    }

    #[test]
    fn workplace_merge_is_fieldwise() {
        let mut w = Workplace {
            name: Some("Acme".into()),
            position: Some("Clerk".into()),
            ..Default::default()
        };
        w.merge(Workplace {
            position: Some("Manager".into()),
            ..Default::default()
        });
        assert_eq!(w.name.as_deref(), Some("Acme"));
        assert_eq!(w.position.as_deref(), Some("Manager"));
    }
}
