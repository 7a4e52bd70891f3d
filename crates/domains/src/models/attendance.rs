//! # Attendance
//!
//! One sheet per (date, subject, class), holding one record per student.
//! Summaries weight a late arrival as half a present:
//! `percentage = (present + 0.5 * late) / max(1, total) * 100`.
//! The same weighting is used by the per-subject report and the dashboard.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::common::Term;
use super::subject::{Subject, SubjectRef};
use crate::error::{AppError, Result};

pub const LATE_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    /// Teacher profile id of whoever wrote this record.
    pub recorded_by: Uuid,
}

/// The uniqueness key of a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendanceKey {
    pub date: NaiveDate,
    pub subject_id: Uuid,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheet {
    pub id: Uuid,
    pub date: NaiveDate,
    pub subject_id: Uuid,
    pub class: String,
    #[serde(default)]
    pub records: Vec<AttendanceRecord>,
    pub academic_year: String,
    pub term: Term,
    pub is_locked: bool,
    pub locked_by: Option<Uuid>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of a mark-attendance request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEntry {
    pub student_id: Uuid,
    #[serde(default)]
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

impl AttendanceSheet {
    pub fn new(key: AttendanceKey, academic_year: String, term: Term, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            date: key.date,
            subject_id: key.subject_id,
            class: key.class,
            records: Vec::new(),
            academic_year,
            term,
            is_locked: false,
            locked_by: None,
            locked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> AttendanceKey {
        AttendanceKey {
            date: self.date,
            subject_id: self.subject_id,
            class: self.class.clone(),
        }
    }

    /// Upserts records by student. A locked sheet refuses every change.
    pub fn merge_records(
        &mut self,
        entries: Vec<RecordEntry>,
        recorded_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.is_locked {
            return Err(AppError::ValidationError(
                "Attendance is locked and cannot be modified".into(),
            ));
        }
        for entry in entries {
            let record = AttendanceRecord {
                student_id: entry.student_id,
                status: entry.status,
                remarks: entry.remarks,
                recorded_by,
            };
            match self.records.iter_mut().find(|r| r.student_id == entry.student_id) {
                Some(existing) => *existing = record,
                None => self.records.push(record),
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn lock(&mut self, locked_by: Uuid, now: DateTime<Utc>) {
        self.is_locked = true;
        self.locked_by = Some(locked_by);
        self.locked_at = Some(now);
        self.updated_at = now;
    }

    pub fn record_for(&self, student_id: Uuid) -> Option<&AttendanceRecord> {
        self.records.iter().find(|r| r.student_id == student_id)
    }
}

pub fn attendance_percentage(present: u32, late: u32, total: u32) -> f64 {
    (present as f64 + LATE_WEIGHT * late as f64) / total.max(1) as f64 * 100.0
}

/// Raw counts for one student over a set of sheets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub total_classes: u32,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
}

impl AttendanceTally {
    pub fn add(&mut self, status: AttendanceStatus) {
        self.total_classes += 1;
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
    }

    pub fn percentage(&self) -> f64 {
        attendance_percentage(self.present, self.late, self.total_classes)
    }
}

/// Dashboard summary across every subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_classes: u32,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub attendance_percentage: f64,
}

impl From<AttendanceTally> for AttendanceSummary {
    fn from(tally: AttendanceTally) -> Self {
        Self {
            total_classes: tally.total_classes,
            present: tally.present,
            absent: tally.absent,
            late: tally.late,
            attendance_percentage: tally.percentage(),
        }
    }
}

/// One row of the per-subject report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttendance {
    pub subject: SubjectRef,
    pub term: Term,
    pub total_classes: u32,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub attendance_percentage: f64,
}

pub fn tally_for(sheets: &[AttendanceSheet], student_id: Uuid) -> AttendanceTally {
    let mut tally = AttendanceTally::default();
    for record in sheets.iter().filter_map(|s| s.record_for(student_id)) {
        tally.add(record.status);
    }
    tally
}

/// Groups the student's records by (subject, term).
///
/// Only sheets for `class` and `academic_year` count. Groups whose subject
/// is not in `subjects` are dropped. Rows are sorted by subject name, then term.
pub fn summarize_by_subject(
    sheets: &[AttendanceSheet],
    student_id: Uuid,
    class: &str,
    academic_year: &str,
    subjects: &HashMap<Uuid, Subject>,
) -> Vec<SubjectAttendance> {
    let mut groups: BTreeMap<(Uuid, Term), AttendanceTally> = BTreeMap::new();
    for sheet in sheets
        .iter()
        .filter(|s| s.class == class && s.academic_year == academic_year)
    {
        if let Some(record) = sheet.record_for(student_id) {
            groups
                .entry((sheet.subject_id, sheet.term))
                .or_default()
                .add(record.status);
        }
    }

    let mut rows: Vec<SubjectAttendance> = groups
        .into_iter()
        .filter_map(|((subject_id, term), tally)| {
            let subject = subjects.get(&subject_id)?;
            Some(SubjectAttendance {
                subject: SubjectRef::from(subject),
                term,
                total_classes: tally.total_classes,
                present: tally.present,
                absent: tally.absent,
                late: tally.late,
                attendance_percentage: tally.percentage(),
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        a.subject
            .name
            .cmp(&b.subject.name)
            .then_with(|| a.term.cmp(&b.term))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subject::NewSubject;

    fn subject(name: &str) -> Subject {
        Subject::new(
            NewSubject {
                name: name.into(),
                code: name.into(),
                description: None,
                credits: 3,
                teacher_id: Uuid::nil(),
                grade: "7".into(),
                academic_year: "2024-2025".into(),
                schedule: vec![],
            },
            Utc::now(),
        )
    }

    fn sheet(subject_id: Uuid, day: u32, term: Term, marks: &[(Uuid, AttendanceStatus)]) -> AttendanceSheet {
        let mut s = AttendanceSheet::new(
            AttendanceKey {
                date: NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
                subject_id,
                class: "7A".into(),
            },
            "2024-2025".into(),
            term,
            Utc::now(),
        );
        let entries = marks
            .iter()
            .map(|(student_id, status)| RecordEntry {
                student_id: *student_id,
                status: *status,
                remarks: None,
            })
            .collect();
        s.merge_records(entries, Uuid::nil(), Utc::now()).unwrap();
        s
    }

    #[test]
    fn late_counts_half() {
        assert_eq!(attendance_percentage(3, 2, 5), 80.0);
        assert_eq!(attendance_percentage(0, 0, 0), 0.0);
    }

    #[test]
    fn locked_sheet_rejects_changes() {
        let student = Uuid::now_v7();
        let mut s = sheet(Uuid::now_v7(), 2, Term::First, &[(student, AttendanceStatus::Present)]);
        s.lock(Uuid::now_v7(), Utc::now());
        let err = s
            .merge_records(
                vec![RecordEntry {
                    student_id: student,
                    status: AttendanceStatus::Absent,
                    remarks: None,
                }],
                Uuid::nil(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(s.records[0].status, AttendanceStatus::Present);
    }

    #[test]
    fn merge_upserts_by_student() {
        let a = Uuid::now_v7();
        let mut s = sheet(Uuid::now_v7(), 2, Term::First, &[(a, AttendanceStatus::Absent)]);
        s.merge_records(
            vec![RecordEntry {
                student_id: a,
                status: AttendanceStatus::Late,
                remarks: Some("bus".into()),
            }],
            Uuid::nil(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(s.records.len(), 1);
        assert_eq!(s.records[0].status, AttendanceStatus::Late);
    }

    #[test]
    fn summary_groups_sorts_and_drops_unknown_subjects() {
        use AttendanceStatus::*;
        let me = Uuid::now_v7();
        let maths = subject("Maths");
        let art = subject("Art");
        let unknown = Uuid::now_v7();
        let sheets = vec![
            sheet(maths.id, 2, Term::Second, &[(me, Present)]),
            sheet(maths.id, 3, Term::First, &[(me, Present)]),
            sheet(maths.id, 4, Term::First, &[(me, Late)]),
            sheet(maths.id, 5, Term::First, &[(me, Absent)]),
            sheet(art.id, 2, Term::First, &[(me, Present)]),
            sheet(unknown, 2, Term::First, &[(me, Present)]),
        ];
        let subjects: HashMap<Uuid, Subject> =
            [(maths.id, maths.clone()), (art.id, art.clone())].into_iter().collect();

        let rows = summarize_by_subject(&sheets, me, "7A", "2024-2025", &subjects);
        let keys: Vec<_> = rows.iter().map(|r| (r.subject.name.as_str(), r.term)).collect();
        assert_eq!(
            keys,
            vec![("Art", Term::First), ("Maths", Term::First), ("Maths", Term::Second)]
        );
        let maths_t1 = &rows[1];
        assert_eq!(maths_t1.total_classes, 3);
        assert_eq!((maths_t1.present, maths_t1.late, maths_t1.absent), (1, 1, 1));
        assert_eq!(maths_t1.attendance_percentage, 50.0);

        assert!(summarize_by_subject(&sheets, me, "8B", "2024-2025", &subjects).is_empty());
    }

    #[test]
    fn dashboard_tally_uses_same_weighting() {
        use AttendanceStatus::*;
        let me = Uuid::now_v7();
        let subject_id = Uuid::now_v7();
        let sheets = vec![
            sheet(subject_id, 2, Term::First, &[(me, Present)]),
            sheet(subject_id, 3, Term::First, &[(me, Late)]),
            sheet(subject_id, 4, Term::First, &[(Uuid::now_v7(), Absent)]),
        ];
        let summary = AttendanceSummary::from(tally_for(&sheets, me));
        assert_eq!(summary.total_classes, 2);
        assert_eq!(summary.attendance_percentage, 75.0);
    }
}
