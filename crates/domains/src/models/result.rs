//! # Result
//!
//! One record per (student, academic year, term) holding the exam entries for
//! that term. `total_marks`, `percentage` and `grade` are derived and are
//! recomputed by every method that changes `exam_results`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::Term;
use super::subject::SubjectRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    Quiz,
    Midterm,
    Final,
    Assignment,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

/// Buckets a percentage: >=90 A+, >=80 A, >=70 B, >=60 C, >=50 D, else F.
pub fn letter_grade(percentage: f64) -> LetterGrade {
    match percentage {
        p if p >= 90.0 => LetterGrade::APlus,
        p if p >= 80.0 => LetterGrade::A,
        p if p >= 70.0 => LetterGrade::B,
        p if p >= 60.0 => LetterGrade::C,
        p if p >= 50.0 => LetterGrade::D,
        _ => LetterGrade::F,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub exam_type: ExamType,
    pub subject_id: Uuid,
    pub marks_obtained: f64,
    pub max_marks: f64,
    /// Free-form grade the teacher may enter for this one exam.
    pub grade: Option<String>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub published_by: Option<Uuid>,
    /// Name and code of `subject_id`, filled in for the student's view only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectRef>,
}

/// Natural key of a result record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub student_id: Uuid,
    pub academic_year: String,
    pub term: Term,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub class: String,
    pub academic_year: String,
    pub term: Term,
    #[serde(default)]
    pub exam_results: Vec<ExamResult>,
    pub total_marks: f64,
    pub percentage: f64,
    pub grade: LetterGrade,
    pub rank: Option<u32>,
    pub remarks: Option<String>,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub published_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived totals for a list of exam entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub total_marks: f64,
    pub percentage: f64,
    pub grade: LetterGrade,
}

pub fn compute_totals(exams: &[ExamResult]) -> Totals {
    let total_marks: f64 = exams.iter().map(|e| e.marks_obtained).sum();
    let max_marks: f64 = exams.iter().map(|e| e.max_marks).sum();
    let percentage = if max_marks > 0.0 {
        total_marks / max_marks * 100.0
    } else {
        0.0
    };
    Totals {
        total_marks,
        percentage,
        grade: letter_grade(percentage),
    }
}

impl ResultRecord {
    pub fn new(key: ResultKey, class: String, now: DateTime<Utc>) -> Self {
        let totals = compute_totals(&[]);
        Self {
            id: Uuid::now_v7(),
            student_id: key.student_id,
            class,
            academic_year: key.academic_year,
            term: key.term,
            exam_results: Vec::new(),
            total_marks: totals.total_marks,
            percentage: totals.percentage,
            grade: totals.grade,
            rank: None,
            remarks: None,
            is_published: false,
            published_at: None,
            published_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> ResultKey {
        ResultKey {
            student_id: self.student_id,
            academic_year: self.academic_year.clone(),
            term: self.term,
        }
    }

    fn recompute(&mut self) {
        let totals = compute_totals(&self.exam_results);
        self.total_marks = totals.total_marks;
        self.percentage = totals.percentage;
        self.grade = totals.grade;
    }

    /// Replaces the entry with the same (exam type, subject) or appends it.
    pub fn upsert_exam(&mut self, exam: ExamResult, now: DateTime<Utc>) {
        match self
            .exam_results
            .iter_mut()
            .find(|e| e.exam_type == exam.exam_type && e.subject_id == exam.subject_id)
        {
            Some(existing) => *existing = exam,
            None => self.exam_results.push(exam),
        }
        self.recompute();
        self.updated_at = now;
    }

    /// Publishes the record and every exam entry not yet published.
    pub fn publish(&mut self, by: Uuid, now: DateTime<Utc>) {
        for exam in self.exam_results.iter_mut().filter(|e| !e.published) {
            exam.published = true;
            exam.published_at = Some(now);
            exam.published_by = Some(by);
        }
        self.is_published = true;
        self.published_at = Some(now);
        self.published_by = Some(by);
        self.updated_at = now;
    }
}

/// Orders by total marks, highest first, and numbers the positions from 1.
/// Equal totals keep their incoming order and still get distinct ranks.
pub fn rank_by_total(mut results: Vec<ResultRecord>) -> Vec<ResultRecord> {
    results.sort_by(|a, b| b.total_marks.total_cmp(&a.total_marks));
    for (idx, result) in results.iter_mut().enumerate() {
        result.rank = Some(idx as u32 + 1);
    }
    results
}

/// Newest academic year first, then latest term first.
impl ResultRecord {
    /// Attaches the matching subject to every exam entry; unknown ids stay bare.
    pub fn with_subjects(mut self, subjects: &HashMap<Uuid, SubjectRef>) -> Self {
        for exam in &mut self.exam_results {
            exam.subject = subjects.get(&exam.subject_id).cloned();
        }
        self
    }
}

pub fn sort_newest_first(results: &mut [ResultRecord]) {
    results.sort_by(|a, b| {
        b.academic_year
            .cmp(&a.academic_year)
            .then_with(|| b.term.cmp(&a.term))
    });
}
