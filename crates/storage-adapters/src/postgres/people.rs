use async_trait::async_trait;
use domains::models::{
    Page, PageRequest, Parent, ParentFilter, Profile, Student, StudentFilter, Teacher,
    TeacherFilter, TokenKind, User, UserFilter,
};
use domains::ports::{ParentRepository, StudentRepository, TeacherRepository, UserRepository};
use domains::{AppError, Result};
use sqlx::types::Json;
use uuid::Uuid;

use super::{db_err, doc, docs, enum_str, page_sql, paged, write_err, PgStore};

fn token_field(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::EmailVerification => "emailVerificationToken",
        TokenKind::PasswordReset => "passwordResetToken",
        TokenKind::Remember => "rememberToken",
    }
}

/// `LIKE` pattern for a case-insensitive substring search.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_account(&self, user: &User, profile: &Profile) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO users (id, email, role, is_active, created_at, doc)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(Json(user))
        .execute(&mut *tx)
        .await
        .map_err(write_err("User with this email already exists"))?;

        let (table, code, body) = match profile {
            Profile::Student(s) => ("students", &s.student_code, serde_json::to_value(s)?),
            Profile::Teacher(t) => ("teachers", &t.teacher_code, serde_json::to_value(t)?),
            Profile::Parent(p) => ("parents", &p.parent_code, serde_json::to_value(p)?),
        };
        sqlx::query(&format!(
            "INSERT INTO {table} (id, user_id, code, doc) VALUES ($1, $2, $3, $4)"
        ))
        .bind(profile.id())
        .bind(profile.user_id())
        .bind(code)
        .bind(body)
        .execute(&mut *tx)
        .await
        .map_err(write_err("Profile code already in use"))?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<()> {
        let done = sqlx::query(
            "UPDATE users SET email = $2, role = $3, is_active = $4, doc = $5 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(Json(user))
        .execute(&self.pool)
        .await
        .map_err(write_err("User with this email already exists"))?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("User", user.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT doc FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT doc FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        docs(&rows)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT doc FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_token(&self, kind: TokenKind, hash: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT doc FROM users WHERE doc->'{}'->>'hash' = $1 LIMIT 1",
            token_field(kind)
        );
        let row = sqlx::query(&sql)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>> {
        let search = filter
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(contains_pattern);
        let sql = page_sql(
            "SELECT doc, created_at FROM users
             WHERE is_active
               AND ($1::text IS NULL OR role = $1)
               AND ($2::text IS NULL
                    OR doc->>'firstName' ILIKE $2
                    OR doc->>'lastName' ILIKE $2
                    OR email ILIKE $2)",
            "created_at DESC",
            3,
        );
        let row = sqlx::query(&sql)
            .bind(filter.role.map(|r| r.as_str()))
            .bind(search)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        paged(&row, page)
    }
}

#[async_trait]
impl StudentRepository for PgStore {
    async fn update(&self, student: &Student) -> Result<()> {
        let done = sqlx::query("UPDATE students SET doc = $2 WHERE id = $1")
            .bind(student.id)
            .bind(Json(student))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("Student", student.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        let row = sqlx::query("SELECT doc FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Student>> {
        let row = sqlx::query("SELECT doc FROM students WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Student>> {
        let row = sqlx::query("SELECT doc FROM students WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn list(&self, filter: &StudentFilter, page: PageRequest) -> Result<Page<Student>> {
        let status = enum_str(&filter.status.unwrap_or_default())?;
        let sql = page_sql(
            "SELECT doc, code FROM students
             WHERE doc->>'status' = $1
               AND ($2::text IS NULL OR doc->>'grade' = $2)
               AND ($3::text IS NULL OR doc->>'class' = $3)
               AND ($4::text IS NULL OR doc->>'academicYear' = $4)",
            "code",
            5,
        );
        let row = sqlx::query(&sql)
            .bind(status)
            .bind(filter.grade.as_deref())
            .bind(filter.class.as_deref())
            .bind(filter.academic_year.as_deref())
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        paged(&row, page)
    }
}

#[async_trait]
impl TeacherRepository for PgStore {
    async fn update(&self, teacher: &Teacher) -> Result<()> {
        let done = sqlx::query("UPDATE teachers SET doc = $2 WHERE id = $1")
            .bind(teacher.id)
            .bind(Json(teacher))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("Teacher", teacher.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Teacher>> {
        let row = sqlx::query("SELECT doc FROM teachers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Teacher>> {
        let rows = sqlx::query("SELECT doc FROM teachers WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        docs(&rows)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Teacher>> {
        let row = sqlx::query("SELECT doc FROM teachers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn list(&self, filter: &TeacherFilter, page: PageRequest) -> Result<Page<Teacher>> {
        let status = enum_str(&filter.status.unwrap_or_default())?;
        let designation = filter.designation.as_ref().map(enum_str).transpose()?;
        let sql = page_sql(
            "SELECT doc, code FROM teachers
             WHERE doc->>'status' = $1
               AND ($2::text IS NULL OR doc->>'department' = $2)
               AND ($3::text IS NULL OR doc->>'designation' = $3)
               AND ($4::text IS NULL OR doc->'subjects' ? $4)",
            "code",
            5,
        );
        let row = sqlx::query(&sql)
            .bind(status)
            .bind(filter.department.as_deref())
            .bind(designation)
            .bind(filter.subject.as_deref())
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        paged(&row, page)
    }
}

#[async_trait]
impl ParentRepository for PgStore {
    async fn update(&self, parent: &Parent) -> Result<()> {
        let done = sqlx::query("UPDATE parents SET doc = $2 WHERE id = $1")
            .bind(parent.id)
            .bind(Json(parent))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("Parent", parent.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Parent>> {
        let row = sqlx::query("SELECT doc FROM parents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Parent>> {
        let row = sqlx::query("SELECT doc FROM parents WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn list(&self, filter: &ParentFilter, page: PageRequest) -> Result<Page<Parent>> {
        let status = enum_str(&filter.status.unwrap_or_default())?;
        let sql = page_sql(
            "SELECT doc, code FROM parents
             WHERE doc->>'status' = $1
               AND ($2::text IS NULL OR lower(doc->>'occupation') = lower($2))",
            "code",
            3,
        );
        let row = sqlx::query(&sql)
            .bind(status)
            .bind(filter.occupation.as_deref())
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        paged(&row, page)
    }

    async fn find_by_student(&self, student_id: Uuid) -> Result<Vec<Parent>> {
        let rows = sqlx::query(
            "SELECT doc FROM parents
             WHERE doc->>'status' = 'active'
               AND doc->'students' @> jsonb_build_array(jsonb_build_object('studentId', $1::text))
             ORDER BY code",
        )
        .bind(student_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        docs(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("ann"), "%ann%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
