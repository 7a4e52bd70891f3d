//! Subjects, assignments, attendance sheets and term results.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::models::{
    Assignment, AssignmentStatus, AttendanceKey, AttendanceSheet, ResultKey, ResultRecord,
    Subject, Term,
};
use domains::ports::{
    AssignmentRepository, AttendanceRepository, AttendanceScope, ResultRepository,
    SubjectRepository,
};
use domains::{AppError, Result};
use std::hash::Hash;
use uuid::Uuid;

use super::{collect, MemoryStore};

/// Binds `key` to `id` unless another id already owns it.
fn claim_key<K: Eq + Hash>(index: &DashMap<K, Uuid>, key: K, id: Uuid, what: &str) -> Result<()> {
    match index.entry(key) {
        Entry::Occupied(owner) if *owner.get() != id => {
            Err(AppError::Conflict(format!("{what} already exists")))
        }
        Entry::Occupied(_) => Ok(()),
        Entry::Vacant(slot) => {
            slot.insert(id);
            Ok(())
        }
    }
}

#[async_trait]
impl SubjectRepository for MemoryStore {
    async fn insert(&self, subject: &Subject) -> Result<()> {
        let key = (subject.code.clone(), subject.academic_year.clone());
        match self.subject_codes.entry(key) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Subject code {} already exists for {}",
                subject.code, subject.academic_year
            ))),
            Entry::Vacant(slot) => {
                slot.insert(subject.id);
                self.subjects.insert(subject.id, subject.clone());
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subject>> {
        Ok(self.subjects.get(&id).map(|s| s.clone()))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Subject>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.subjects.get(id).map(|s| s.clone()))
            .collect())
    }

    async fn list_by_grade(&self, grade: &str, academic_year: &str) -> Result<Vec<Subject>> {
        let mut subjects = collect(&self.subjects, |s| {
            s.is_active && s.grade == grade && s.academic_year == academic_year
        });
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subjects)
    }
}

#[async_trait]
impl AssignmentRepository for MemoryStore {
    async fn insert(&self, assignment: &Assignment) -> Result<()> {
        match self.assignments.entry(assignment.id) {
            Entry::Occupied(_) => Err(AppError::Conflict("Assignment already exists".into())),
            Entry::Vacant(slot) => {
                slot.insert(assignment.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, assignment: &Assignment) -> Result<()> {
        let mut slot = self
            .assignments
            .get_mut(&assignment.id)
            .ok_or_else(|| AppError::not_found("Assignment", assignment.id))?;
        *slot = assignment.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>> {
        Ok(self.assignments.get(&id).map(|a| a.clone()))
    }

    async fn list_by_class(
        &self,
        class: &str,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>> {
        let mut assignments = collect(&self.assignments, |a| {
            a.class == class && status.map_or(true, |s| a.status == s)
        });
        assignments.sort_by_key(|a| a.due_date);
        Ok(assignments)
    }
}

#[async_trait]
impl AttendanceRepository for MemoryStore {
    async fn find_by_key(&self, key: &AttendanceKey) -> Result<Option<AttendanceSheet>> {
        let Some(id) = self.attendance_keys.get(key).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.attendance.get(&id).map(|s| s.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttendanceSheet>> {
        Ok(self.attendance.get(&id).map(|s| s.clone()))
    }

    async fn save(&self, sheet: &AttendanceSheet) -> Result<()> {
        claim_key(&self.attendance_keys, sheet.key(), sheet.id, "Attendance sheet")?;
        self.attendance.insert(sheet.id, sheet.clone());
        Ok(())
    }

    async fn list_for_student(&self, scope: &AttendanceScope) -> Result<Vec<AttendanceSheet>> {
        let mut sheets = collect(&self.attendance, |s| {
            s.class == scope.class
                && scope
                    .academic_year
                    .as_deref()
                    .map_or(true, |y| s.academic_year == y)
                && s.record_for(scope.student_id).is_some()
        });
        sheets.sort_by_key(|s| s.date);
        Ok(sheets)
    }
}

#[async_trait]
impl ResultRepository for MemoryStore {
    async fn find_by_key(&self, key: &ResultKey) -> Result<Option<ResultRecord>> {
        let Some(id) = self.result_keys.get(key).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.results.get(&id).map(|r| r.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResultRecord>> {
        Ok(self.results.get(&id).map(|r| r.clone()))
    }

    async fn save(&self, record: &ResultRecord) -> Result<()> {
        claim_key(&self.result_keys, record.key(), record.id, "Result record")?;
        self.results.insert(record.id, record.clone());
        Ok(())
    }

    async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<ResultRecord>> {
        let mut records = collect(&self.results, |r| r.student_id == student_id);
        records.sort_by(|a, b| {
            b.academic_year
                .cmp(&a.academic_year)
                .then_with(|| b.term.cmp(&a.term))
        });
        Ok(records)
    }

    async fn list_published_for_class(
        &self,
        class: &str,
        academic_year: &str,
        term: Term,
    ) -> Result<Vec<ResultRecord>> {
        Ok(collect(&self.results, |r| {
            r.is_published && r.class == class && r.academic_year == academic_year && r.term == term
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use domains::models::NewSubject;

    fn subject(code: &str, year: &str, name: &str) -> Subject {
        Subject::new(
            NewSubject {
                name: name.into(),
                code: code.into(),
                description: None,
                credits: 3,
                teacher_id: Uuid::now_v7(),
                grade: "8".into(),
                academic_year: year.into(),
                schedule: Vec::new(),
            },
            Utc::now(),
        )
    }

    fn sheet_key() -> AttendanceKey {
        AttendanceKey {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            subject_id: Uuid::now_v7(),
            class: "8A".into(),
        }
    }

    #[tokio::test]
    async fn subject_code_is_unique_per_year_only() {
        let store = MemoryStore::new();
        SubjectRepository::insert(&store, &subject("MATH8", "2024", "Maths")).await.unwrap();
        let dup = SubjectRepository::insert(&store, &subject("MATH8", "2024", "Maths II")).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));
        SubjectRepository::insert(&store, &subject("MATH8", "2025", "Maths")).await.unwrap();
    }

    #[tokio::test]
    async fn grade_listing_is_sorted_by_name() {
        let store = MemoryStore::new();
        SubjectRepository::insert(&store, &subject("SCI8", "2024", "Science")).await.unwrap();
        SubjectRepository::insert(&store, &subject("ART8", "2024", "Art")).await.unwrap();
        SubjectRepository::insert(&store, &subject("ENG8", "2023", "English")).await.unwrap();
        let names: Vec<_> = store
            .list_by_grade("8", "2024")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Art", "Science"]);
    }

    #[tokio::test]
    async fn second_sheet_for_same_key_conflicts() {
        let store = MemoryStore::new();
        let key = sheet_key();
        let now = Utc::now();
        let first = AttendanceSheet::new(key.clone(), "2024".into(), Term::First, now);
        AttendanceRepository::save(&store, &first).await.unwrap();
        // re-saving the same sheet is an update
        AttendanceRepository::save(&store, &first).await.unwrap();

        let rival = AttendanceSheet::new(key.clone(), "2024".into(), Term::First, now);
        let err = AttendanceRepository::save(&store, &rival).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let found = AttendanceRepository::find_by_key(&store, &key).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn result_key_conflicts_for_a_new_record() {
        let store = MemoryStore::new();
        let key = ResultKey {
            student_id: Uuid::now_v7(),
            academic_year: "2024".into(),
            term: Term::Second,
        };
        let now = Utc::now();
        let first = ResultRecord::new(key.clone(), "8A".into(), now);
        ResultRepository::save(&store, &first).await.unwrap();
        let rival = ResultRecord::new(key, "8A".into(), now);
        assert!(ResultRepository::save(&store, &rival).await.is_err());
    }
}
