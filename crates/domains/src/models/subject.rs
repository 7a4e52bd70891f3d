//! Subjects and the weekly timetable built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// School days, Monday through Saturday, in timetable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SchoolDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl SchoolDay {
    pub const ALL: [SchoolDay; 6] = [
        SchoolDay::Monday,
        SchoolDay::Tuesday,
        SchoolDay::Wednesday,
        SchoolDay::Thursday,
        SchoolDay::Friday,
        SchoolDay::Saturday,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub day: SchoolDay,
    /// `HH:MM`, compared lexically.
    pub start_time: String,
    pub end_time: String,
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    /// Uppercase; unique within an academic year.
    pub code: String,
    pub description: Option<String>,
    pub credits: u8,
    /// Teacher profile id.
    pub teacher_id: Uuid,
    pub grade: String,
    pub academic_year: String,
    #[serde(default)]
    pub schedule: Vec<ScheduleSlot>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub credits: u8,
    pub teacher_id: Uuid,
    pub grade: String,
    pub academic_year: String,
    pub schedule: Vec<ScheduleSlot>,
}

impl Subject {
    pub fn new(new: NewSubject, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: new.name.trim().to_string(),
            code: new.code.trim().to_uppercase(),
            description: new.description,
            credits: new.credits,
            teacher_id: new.teacher_id,
            grade: new.grade,
            academic_year: new.academic_year,
            schedule: new.schedule,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

impl From<&Subject> for SubjectRef {
    fn from(subject: &Subject) -> Self {
        Self {
            id: subject.id,
            name: subject.name.clone(),
            code: subject.code.clone(),
        }
    }
}

/// One timetable entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub subject: SubjectRef,
    /// Display name of the teacher, when known.
    pub teacher: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub room: Option<String>,
}

/// Every school day is present, even when empty.
pub type WeeklySchedule = BTreeMap<SchoolDay, Vec<Session>>;

/// Flattens the subjects' slots into per-day lists sorted by start time.
/// `teacher_name` resolves a teacher profile id to a display name.
pub fn weekly_schedule<F>(subjects: &[Subject], teacher_name: F) -> WeeklySchedule
where
    F: Fn(Uuid) -> Option<String>,
{
    let mut schedule: WeeklySchedule = SchoolDay::ALL.iter().map(|d| (*d, Vec::new())).collect();

    for subject in subjects {
        let teacher = teacher_name(subject.teacher_id);
        for slot in &subject.schedule {
            schedule.entry(slot.day).or_default().push(Session {
                subject: SubjectRef::from(subject),
                teacher: teacher.clone(),
                start_time: slot.start_time.clone(),
                end_time: slot.end_time.clone(),
                room: slot.room.clone(),
            });
        }
    }

    for sessions in schedule.values_mut() {
        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    }
    schedule
}
