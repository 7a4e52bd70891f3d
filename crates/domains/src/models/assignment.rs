//! # Assignment
//!
//! Assignments own their submissions; a student has at most one. Submission
//! status is derived from the submit time against the due date, never
//! supplied by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    #[default]
    Draft,
    Published,
    Graded,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Submitted,
    Late,
    /// Reserved for teacher grading; no workflow sets it yet.
    Graded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub url: String,
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub student_id: Uuid,
    pub submitted_on: DateTime<Utc>,
    pub status: SubmissionStatus,
    pub file_url: String,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub graded_by: Option<Uuid>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub subject_id: Uuid,
    /// Teacher profile id.
    pub teacher_id: Uuid,
    pub class: String,
    pub due_date: DateTime<Utc>,
    pub total_marks: u32,
    #[serde(default)]
    pub submissions: Vec<Submission>,
    pub status: AssignmentStatus,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub academic_year: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub subject_id: Uuid,
    pub teacher_id: Uuid,
    pub class: String,
    pub due_date: DateTime<Utc>,
    pub total_marks: u32,
    pub status: AssignmentStatus,
    pub attachments: Vec<Attachment>,
    pub academic_year: String,
}

/// `submitted` when `now <= due_date`, otherwise `late`.
pub fn submission_status(due_date: DateTime<Utc>, now: DateTime<Utc>) -> SubmissionStatus {
    if now > due_date {
        SubmissionStatus::Late
    } else {
        SubmissionStatus::Submitted
    }
}

impl Assignment {
    pub fn new(new: NewAssignment, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            subject_id: new.subject_id,
            teacher_id: new.teacher_id,
            class: new.class,
            due_date: new.due_date,
            total_marks: new.total_marks,
            submissions: Vec::new(),
            status: new.status,
            attachments: new.attachments,
            academic_year: new.academic_year,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn submission_for(&self, student_id: Uuid) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.student_id == student_id)
    }

    /// Records the student's submission, replacing any earlier one.
    pub fn submit(&mut self, student_id: Uuid, file_url: String, now: DateTime<Utc>) -> &Submission {
        let submission = Submission {
            student_id,
            submitted_on: now,
            status: submission_status(self.due_date, now),
            file_url,
            grade: None,
            feedback: None,
            graded_by: None,
            graded_at: None,
        };
        self.updated_at = now;

        let idx = match self.submissions.iter().position(|s| s.student_id == student_id) {
            Some(idx) => {
                self.submissions[idx] = submission;
                idx
            }
            None => {
                self.submissions.push(submission);
                self.submissions.len() - 1
            }
        };
        &self.submissions[idx]
    }

    /// Open for this student: due now or later and not yet submitted.
    pub fn is_pending_for(&self, student_id: Uuid, now: DateTime<Utc>) -> bool {
        self.due_date >= now && self.submission_for(student_id).is_none()
    }

    /// The assignment as one student sees it: their own submission only.
    pub fn view_for(&self, student_id: Uuid) -> StudentAssignmentView {
        let submission = self.submission_for(student_id);
        StudentAssignmentView {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            class: self.class.clone(),
            due_date: self.due_date,
            total_marks: self.total_marks,
            status: self.status,
            attachments: self.attachments.clone(),
            academic_year: self.academic_year.clone(),
            submission_status: submission
                .map(|s| StudentSubmissionState::from(s.status))
                .unwrap_or(StudentSubmissionState::NotSubmitted),
            grade: submission.and_then(|s| s.grade),
            submitted: submission.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentSubmissionState {
    NotSubmitted,
    Submitted,
    Late,
    Graded,
}

impl From<SubmissionStatus> for StudentSubmissionState {
    fn from(status: SubmissionStatus) -> Self {
        match status {
            SubmissionStatus::Submitted => StudentSubmissionState::Submitted,
            SubmissionStatus::Late => StudentSubmissionState::Late,
            SubmissionStatus::Graded => StudentSubmissionState::Graded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssignmentView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub subject_id: Uuid,
    pub teacher_id: Uuid,
    pub class: String,
    pub due_date: DateTime<Utc>,
    pub total_marks: u32,
    pub status: AssignmentStatus,
    pub attachments: Vec<Attachment>,
    pub academic_year: String,
    pub submission_status: StudentSubmissionState,
    pub grade: Option<f64>,
    pub submitted: bool,
}
