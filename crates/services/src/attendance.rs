//! Teacher-side attendance: marking sheets and locking them.

use std::sync::Arc;

use chrono::NaiveDate;
use domains::models::{AttendanceKey, AttendanceSheet, AttendanceStatus, RecordEntry, Role, Term};
use domains::ports::{AttendanceRepository, Clock, Repositories, SubjectRepository, TeacherRepository};
use domains::{AppError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::{own_teacher, Actor};
use crate::validation::validate_input;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntryInput {
    #[serde(alias = "student")]
    pub student_id: Uuid,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[validate(length(max = 200))]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceRequest {
    pub date: NaiveDate,
    #[serde(alias = "subject")]
    pub subject_id: Uuid,
    #[validate(length(min = 1, max = 50, message = "Class is required"))]
    pub class: String,
    #[validate(length(min = 4, max = 10))]
    pub academic_year: String,
    pub term: Term,
    #[validate(length(min = 1, message = "At least one attendance record is required"), nested)]
    pub records: Vec<AttendanceEntryInput>,
}

pub struct AttendanceService {
    attendance: Arc<dyn AttendanceRepository>,
    subjects: Arc<dyn SubjectRepository>,
    teachers: Arc<dyn TeacherRepository>,
    clock: Arc<dyn Clock>,
}

impl AttendanceService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            attendance: repos.attendance.clone(),
            subjects: repos.subjects.clone(),
            teachers: repos.teachers.clone(),
            clock,
        }
    }

    /// Find-or-create the sheet for (date, subject, class), then upsert
    /// the records by student.
    pub async fn mark(&self, actor: &Actor, req: MarkAttendanceRequest) -> Result<AttendanceSheet> {
        actor.require_role(Role::Teacher)?;
        validate_input(&req)?;
        let teacher = own_teacher(self.teachers.as_ref(), actor).await?;
        if self.subjects.find_by_id(req.subject_id).await?.is_none() {
            return Err(AppError::not_found("Subject", req.subject_id));
        }

        let now = self.clock.now();
        let key = AttendanceKey {
            date: req.date,
            subject_id: req.subject_id,
            class: req.class.trim().to_string(),
        };
        let mut sheet = match self.attendance.find_by_key(&key).await? {
            Some(existing) => existing,
            None => AttendanceSheet::new(key, req.academic_year.trim().to_string(), req.term, now),
        };

        let entries = req
            .records
            .into_iter()
            .map(|r| RecordEntry {
                student_id: r.student_id,
                status: r.status,
                remarks: r.remarks,
            })
            .collect();
        sheet.merge_records(entries, teacher.id, now)?;
        self.attendance.save(&sheet).await?;

        info!(
            sheet_id = %sheet.id,
            class = %sheet.class,
            date = %sheet.date,
            records = sheet.records.len(),
            "attendance marked"
        );
        Ok(sheet)
    }

    /// Locking twice keeps the first lock stamp.
    pub async fn lock(&self, actor: &Actor, sheet_id: Uuid) -> Result<AttendanceSheet> {
        actor.require_role(Role::Teacher)?;
        let teacher = own_teacher(self.teachers.as_ref(), actor).await?;
        let mut sheet = self
            .attendance
            .find_by_id(sheet_id)
            .await?
            .ok_or_else(|| AppError::not_found("Attendance", sheet_id))?;
        if sheet.is_locked {
            return Ok(sheet);
        }
        sheet.lock(teacher.id, self.clock.now());
        self.attendance.save(&sheet).await?;
        info!(sheet_id = %sheet.id, "attendance locked");
        Ok(sheet)
    }
}
