use async_trait::async_trait;
use domains::models::{
    Assignment, AssignmentStatus, AttendanceKey, AttendanceSheet, ResultKey, ResultRecord,
    Subject, Term,
};
use domains::ports::{
    AssignmentRepository, AttendanceRepository, AttendanceScope, ResultRepository,
    SubjectRepository,
};
use domains::{AppError, Result};
use sqlx::types::Json;
use uuid::Uuid;

use super::{db_err, doc, docs, enum_str, write_err, PgStore};

#[async_trait]
impl SubjectRepository for PgStore {
    async fn insert(&self, subject: &Subject) -> Result<()> {
        sqlx::query(
            "INSERT INTO subjects (id, code, academic_year, grade, name, is_active, doc)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(subject.id)
        .bind(&subject.code)
        .bind(&subject.academic_year)
        .bind(&subject.grade)
        .bind(&subject.name)
        .bind(subject.is_active)
        .bind(Json(subject))
        .execute(&self.pool)
        .await
        .map_err(write_err("Subject code already exists for this academic year"))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subject>> {
        let row = sqlx::query("SELECT doc FROM subjects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Subject>> {
        let rows = sqlx::query("SELECT doc FROM subjects WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        docs(&rows)
    }

    async fn list_by_grade(&self, grade: &str, academic_year: &str) -> Result<Vec<Subject>> {
        let rows = sqlx::query(
            "SELECT doc FROM subjects
             WHERE is_active AND grade = $1 AND academic_year = $2
             ORDER BY name",
        )
        .bind(grade)
        .bind(academic_year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        docs(&rows)
    }
}

#[async_trait]
impl AssignmentRepository for PgStore {
    async fn insert(&self, assignment: &Assignment) -> Result<()> {
        sqlx::query(
            "INSERT INTO assignments (id, class, status, due_date, doc)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(assignment.id)
        .bind(&assignment.class)
        .bind(enum_str(&assignment.status)?)
        .bind(assignment.due_date)
        .bind(Json(assignment))
        .execute(&self.pool)
        .await
        .map_err(write_err("Assignment already exists"))?;
        Ok(())
    }

    async fn update(&self, assignment: &Assignment) -> Result<()> {
        let done = sqlx::query(
            "UPDATE assignments SET class = $2, status = $3, due_date = $4, doc = $5 WHERE id = $1",
        )
        .bind(assignment.id)
        .bind(&assignment.class)
        .bind(enum_str(&assignment.status)?)
        .bind(assignment.due_date)
        .bind(Json(assignment))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("Assignment", assignment.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>> {
        let row = sqlx::query("SELECT doc FROM assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn list_by_class(
        &self,
        class: &str,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>> {
        let status = status.as_ref().map(enum_str).transpose()?;
        let rows = sqlx::query(
            "SELECT doc FROM assignments
             WHERE class = $1 AND ($2::text IS NULL OR status = $2)
             ORDER BY due_date",
        )
        .bind(class)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        docs(&rows)
    }
}

#[async_trait]
impl AttendanceRepository for PgStore {
    async fn find_by_key(&self, key: &AttendanceKey) -> Result<Option<AttendanceSheet>> {
        let row = sqlx::query(
            "SELECT doc FROM attendance WHERE date = $1 AND subject_id = $2 AND class = $3",
        )
        .bind(key.date)
        .bind(key.subject_id)
        .bind(&key.class)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttendanceSheet>> {
        let row = sqlx::query("SELECT doc FROM attendance WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn save(&self, sheet: &AttendanceSheet) -> Result<()> {
        sqlx::query(
            "INSERT INTO attendance (id, date, subject_id, class, academic_year, doc)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(sheet.id)
        .bind(sheet.date)
        .bind(sheet.subject_id)
        .bind(&sheet.class)
        .bind(&sheet.academic_year)
        .bind(Json(sheet))
        .execute(&self.pool)
        .await
        .map_err(write_err("Attendance sheet already exists"))?;
        Ok(())
    }

    async fn list_for_student(&self, scope: &AttendanceScope) -> Result<Vec<AttendanceSheet>> {
        let rows = sqlx::query(
            "SELECT doc FROM attendance
             WHERE class = $1
               AND ($2::text IS NULL OR academic_year = $2)
               AND doc->'records' @> jsonb_build_array(jsonb_build_object('studentId', $3::text))
             ORDER BY date",
        )
        .bind(&scope.class)
        .bind(scope.academic_year.as_deref())
        .bind(scope.student_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        docs(&rows)
    }
}

#[async_trait]
impl ResultRepository for PgStore {
    async fn find_by_key(&self, key: &ResultKey) -> Result<Option<ResultRecord>> {
        let row = sqlx::query(
            "SELECT doc FROM results WHERE student_id = $1 AND academic_year = $2 AND term = $3",
        )
        .bind(key.student_id)
        .bind(&key.academic_year)
        .bind(key.term.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResultRecord>> {
        let row = sqlx::query("SELECT doc FROM results WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn save(&self, record: &ResultRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO results (id, student_id, academic_year, term, class, is_published, doc)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE
             SET class = EXCLUDED.class, is_published = EXCLUDED.is_published, doc = EXCLUDED.doc",
        )
        .bind(record.id)
        .bind(record.student_id)
        .bind(&record.academic_year)
        .bind(record.term.as_str())
        .bind(&record.class)
        .bind(record.is_published)
        .bind(Json(record))
        .execute(&self.pool)
        .await
        .map_err(write_err("Result record already exists"))?;
        Ok(())
    }

    async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<ResultRecord>> {
        let rows = sqlx::query(
            "SELECT doc FROM results WHERE student_id = $1
             ORDER BY academic_year DESC, term DESC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        docs(&rows)
    }

    async fn list_published_for_class(
        &self,
        class: &str,
        academic_year: &str,
        term: Term,
    ) -> Result<Vec<ResultRecord>> {
        let rows = sqlx::query(
            "SELECT doc FROM results
             WHERE is_published AND class = $1 AND academic_year = $2 AND term = $3",
        )
        .bind(class)
        .bind(academic_year)
        .bind(term.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        docs(&rows)
    }
}
